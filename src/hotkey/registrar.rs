//! Global hotkey registration state machine
//!
//! `Unregistered -> Registering -> Registered -> Unregistered`, or
//! `Registering -> Failed` when the OS refuses the binding. A failed
//! registration holds no OS resources and raises no events.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::combo::HotkeyCombination;

/// Id the binding is registered under
pub const HOTKEY_ID: i32 = 9000;

/// Events sent from a hotkey backend to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The registered combination was pressed (one per key-down)
    Pressed { id: i32 },
}

/// Errors that can occur while registering a hotkey
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey {combination} refused by the system (error {code}); another application may own it")]
    Refused {
        combination: HotkeyCombination,
        code: u32,
    },

    #[error("hotkey {0} has no key code")]
    NoKeyCode(HotkeyCombination),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("hotkey listener exited before reporting")]
    ListenerGone,
}

/// OS boundary for one process-wide hotkey binding
pub trait HotkeyBackend {
    /// Bind `combination` under `id`, delivering presses to `events`
    fn register(
        &mut self,
        id: i32,
        combination: HotkeyCombination,
        events: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError>;

    /// Release the binding made under `id`
    fn unregister(&mut self, id: i32);
}

/// Where the registrar is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarState {
    Unregistered,
    Registering,
    Registered(HotkeyCombination),
    Failed(HotkeyCombination),
}

impl fmt::Display for RegistrarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrarState::Unregistered => write!(f, "Unregistered"),
            RegistrarState::Registering => write!(f, "Registering"),
            RegistrarState::Registered(combo) => write!(f, "Registered({combo})"),
            RegistrarState::Failed(combo) => write!(f, "Failed({combo})"),
        }
    }
}

/// Owns at most one global hotkey binding at a time
pub struct HotkeyRegistrar<B: HotkeyBackend> {
    backend: B,
    id: i32,
    state: RegistrarState,
    events: mpsc::Sender<HotkeyEvent>,
}

impl<B: HotkeyBackend> HotkeyRegistrar<B> {
    pub fn new(backend: B, events: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            backend,
            id: HOTKEY_ID,
            state: RegistrarState::Unregistered,
            events,
        }
    }

    pub fn state(&self) -> RegistrarState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.state, RegistrarState::Registered(_))
    }

    /// Register `combination`, replacing any current binding
    ///
    /// Returns `false` if the OS refused; the registrar is then inert.
    pub fn register(&mut self, combination: HotkeyCombination) -> bool {
        self.unregister();

        self.state = RegistrarState::Registering;
        let result = match combination.virtual_key() {
            Some(_) => self
                .backend
                .register(self.id, combination, self.events.clone()),
            None => Err(HotkeyError::NoKeyCode(combination)),
        };
        match result {
            Ok(()) => {
                info!(%combination, "global hotkey registered");
                self.state = RegistrarState::Registered(combination);
                true
            }
            Err(e) => {
                warn!(%combination, error = %e, "global hotkey registration failed");
                self.state = RegistrarState::Failed(combination);
                false
            }
        }
    }

    /// Release the binding; safe to call repeatedly or when never registered
    pub fn unregister(&mut self) {
        if let RegistrarState::Registered(combination) = self.state {
            self.backend.unregister(self.id);
            info!(%combination, "global hotkey released");
        }
        self.state = RegistrarState::Unregistered;
    }

    /// Whether `event` belongs to the current binding
    pub fn accepts(&self, event: &HotkeyEvent) -> bool {
        match event {
            HotkeyEvent::Pressed { id } => *id == self.id && self.is_registered(),
        }
    }
}

impl<B: HotkeyBackend> Drop for HotkeyRegistrar<B> {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Calls seen by [`FakeBackend`]
    #[derive(Debug, Default)]
    pub struct FakeLog {
        pub registered: Vec<HotkeyCombination>,
        pub unregistered: usize,
        pub sender: Option<mpsc::Sender<HotkeyEvent>>,
    }

    /// In-memory backend; refuses combinations listed in `taken`
    #[derive(Clone, Default)]
    pub struct FakeBackend {
        pub log: Arc<Mutex<FakeLog>>,
        pub taken: Vec<HotkeyCombination>,
    }

    impl FakeBackend {
        /// Simulate the OS delivering a press
        pub async fn press(&self) {
            let sender = self.log.lock().unwrap().sender.clone();
            if let Some(sender) = sender {
                sender.send(HotkeyEvent::Pressed { id: HOTKEY_ID }).await.unwrap();
            }
        }
    }

    impl HotkeyBackend for FakeBackend {
        fn register(
            &mut self,
            _id: i32,
            combination: HotkeyCombination,
            events: mpsc::Sender<HotkeyEvent>,
        ) -> Result<(), HotkeyError> {
            if self.taken.contains(&combination) {
                return Err(HotkeyError::Refused {
                    combination,
                    code: 1409,
                });
            }
            let mut log = self.log.lock().unwrap();
            log.registered.push(combination);
            log.sender = Some(events);
            Ok(())
        }

        fn unregister(&mut self, _id: i32) {
            let mut log = self.log.lock().unwrap();
            log.unregistered += 1;
            log.sender = None;
        }
    }
}
