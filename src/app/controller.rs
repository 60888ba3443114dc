//! The single owner of all UI state
//!
//! Hotkey presses and commands (tray actions, view queries, edits) are
//! processed one at a time on this task, so the store, settings and window
//! state are only ever mutated from one place. Every change is announced as
//! an [`AppEvent`].

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::events::AppEvent;
use crate::hotkey::{HotkeyBackend, HotkeyCombination, HotkeyEvent, HotkeyRegistrar};
use crate::settings::Settings;
use crate::store::{
    Category, LoadSource, NewShortcut, PersistQueue, ShortcutPatch, ShortcutRecord, ShortcutStore,
};
use crate::window::{CloseDecision, VisibilityController, WindowSurface};

const APP_NAME: &str = "PowerKeys";

/// Requests processed by the controller
#[derive(Debug)]
pub enum Command {
    /// Tray "Show", or a double-click on the tray icon
    Show,
    /// Tray "Hide"
    Hide,
    Toggle,
    /// Tray "Exit"
    Exit,
    /// The window was minimized
    Minimized,
    /// The window's close control was used
    CloseRequested,
    Query {
        category: Option<String>,
        search: Option<String>,
        reply: oneshot::Sender<Vec<ShortcutRecord>>,
    },
    ListCategories {
        reply: oneshot::Sender<CategoryListing>,
    },
    AddShortcut {
        shortcut: NewShortcut,
        reply: oneshot::Sender<ShortcutRecord>,
    },
    UpdateShortcut {
        id: String,
        patch: ShortcutPatch,
        reply: oneshot::Sender<Option<ShortcutRecord>>,
    },
    RemoveShortcut {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    GetStatus {
        reply: oneshot::Sender<AppStatus>,
    },
    GetSettings {
        reply: oneshot::Sender<Settings>,
    },
    UpdateSettings {
        settings: Box<Settings>,
        reply: oneshot::Sender<Settings>,
    },
}

/// Category names for a picker plus the persisted category details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryListing {
    /// `All` first, then every distinct category name
    pub names: Vec<String>,
    pub categories: Vec<Category>,
}

/// Status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    pub version: String,
    pub window_visible: bool,
    pub hotkey: String,
    pub hotkey_registered: bool,
    /// Registrar lifecycle, e.g. `Registered(Ctrl+Alt+K)`
    pub hotkey_state: String,
    pub shortcut_count: usize,
    /// Which document the collection was loaded from
    pub shortcut_source: LoadSource,
    pub uptime_secs: u64,
}

/// Whether the loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Controller<B: HotkeyBackend, W: WindowSurface> {
    store: ShortcutStore,
    settings: Settings,
    settings_path: PathBuf,
    queue: PersistQueue,
    registrar: HotkeyRegistrar<B>,
    visibility: VisibilityController<W>,
    event_tx: broadcast::Sender<AppEvent>,
    started_at: Instant,
}

impl<B: HotkeyBackend, W: WindowSurface> Controller<B, W> {
    pub fn new(
        store: ShortcutStore,
        settings: Settings,
        settings_path: PathBuf,
        queue: PersistQueue,
        registrar: HotkeyRegistrar<B>,
        mut window: W,
        event_tx: broadcast::Sender<AppEvent>,
    ) -> Self {
        window.set_geometry(settings.window);
        Self {
            store,
            settings,
            settings_path,
            queue,
            registrar,
            visibility: VisibilityController::new(window),
            event_tx,
            started_at: Instant::now(),
        }
    }

    /// Bind the configured hotkey; a refusal becomes a notice, not an error
    pub fn start(&mut self) -> bool {
        let combination = HotkeyCombination::parse(&self.settings.global_hotkey);
        self.bind_hotkey(combination)
    }

    /// Process hotkey events and commands until exit or until both sources close
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut command_rx: mpsc::Receiver<Command>,
    ) {
        info!("controller started, window hidden");

        loop {
            tokio::select! {
                Some(event) = hotkey_rx.recv() => self.handle_hotkey(event),
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("command channel closed");
                        break;
                    };
                    if self.handle_command(command) == Flow::Exit {
                        break;
                    }
                }
            }
        }

        info!("controller stopped");
    }

    /// Release the hotkey and queue a final settings save
    pub fn shutdown(&mut self) {
        self.registrar.unregister();
        self.persist_settings();
    }

    fn handle_hotkey(&mut self, event: HotkeyEvent) {
        if self.registrar.accepts(&event) {
            debug!(?event, "hotkey pressed");
            self.toggle();
        } else {
            debug!(?event, "stale hotkey event ignored");
        }
    }

    fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Show => self.show(),
            Command::Hide => self.hide(),
            Command::Toggle => self.toggle(),
            Command::Exit => return self.exit(),
            Command::Minimized => {
                self.visibility.on_minimized();
                self.after_hide();
            }
            Command::CloseRequested => match self.visibility.on_close_requested() {
                CloseDecision::Hide => self.after_hide(),
                CloseDecision::Exit => return Flow::Exit,
            },
            Command::Query {
                category,
                search,
                reply,
            } => {
                let results = self.store.query(category.as_deref(), search.as_deref());
                let _ = reply.send(results);
            }
            Command::ListCategories { reply } => {
                let _ = reply.send(CategoryListing {
                    names: self.store.category_names(),
                    categories: self.store.categories().to_vec(),
                });
            }
            Command::AddShortcut { shortcut, reply } => {
                let (record, ticket) = self.store.add(shortcut);
                ticket.detach();
                self.shortcuts_changed();
                let _ = reply.send(record);
            }
            Command::UpdateShortcut { id, patch, reply } => {
                let updated = self.store.update(&id, patch).map(|(record, ticket)| {
                    ticket.detach();
                    record
                });
                if updated.is_some() {
                    self.shortcuts_changed();
                }
                let _ = reply.send(updated);
            }
            Command::RemoveShortcut { id, reply } => {
                let (removed, ticket) = self.store.remove(&id);
                ticket.detach();
                if removed {
                    self.shortcuts_changed();
                }
                let _ = reply.send(removed);
            }
            Command::GetStatus { reply } => {
                let _ = reply.send(self.status());
            }
            Command::GetSettings { reply } => {
                let _ = reply.send(self.settings.clone());
            }
            Command::UpdateSettings { settings, reply } => {
                self.apply_settings(*settings);
                let _ = reply.send(self.settings.clone());
            }
        }
        Flow::Continue
    }

    fn toggle(&mut self) {
        if self.visibility.toggle() {
            self.emit(AppEvent::WindowShown);
        } else {
            self.after_hide();
        }
    }

    fn show(&mut self) {
        self.visibility.show();
        self.emit(AppEvent::WindowShown);
    }

    fn hide(&mut self) {
        self.visibility.hide();
        self.after_hide();
    }

    fn after_hide(&mut self) {
        self.emit(AppEvent::WindowHidden);
        self.persist_settings();
    }

    /// Let the window close for real and stop the loop
    fn exit(&mut self) -> Flow {
        info!("exit requested");
        self.visibility.request_exit();
        self.emit(AppEvent::ExitRequested);
        match self.visibility.on_close_requested() {
            CloseDecision::Exit => Flow::Exit,
            CloseDecision::Hide => Flow::Continue,
        }
    }

    fn apply_settings(&mut self, mut settings: Settings) {
        let previous = HotkeyCombination::parse(&self.settings.global_hotkey);
        let requested = HotkeyCombination::parse(&settings.global_hotkey);
        settings.global_hotkey = requested.to_string();

        self.visibility.window_mut().set_geometry(settings.window);
        self.settings = settings;

        if requested != previous || !self.registrar.is_registered() {
            self.bind_hotkey(requested);
        }

        self.settings.save(&self.settings_path, &self.queue).detach();
        info!(hotkey = %self.settings.global_hotkey, columns = self.settings.grid_columns(), "settings updated");
        self.emit(AppEvent::SettingsChanged);
    }

    fn bind_hotkey(&mut self, combination: HotkeyCombination) -> bool {
        let registered = self.registrar.register(combination);
        let text = combination.to_string();
        if registered {
            self.emit(AppEvent::HotkeyRegistered { combination: text });
        } else {
            warn!(combination = %text, "continuing without global hotkey");
            self.emit(AppEvent::HotkeyUnavailable {
                combination: text.clone(),
            });
            self.emit(AppEvent::Notice {
                title: APP_NAME.to_string(),
                message: format!(
                    "Failed to register global hotkey {text}. Another application may be using it."
                ),
            });
        }
        registered
    }

    fn persist_settings(&mut self) {
        self.settings.window = self.visibility.window().geometry();
        self.settings.save(&self.settings_path, &self.queue).detach();
    }

    fn shortcuts_changed(&self) {
        self.emit(AppEvent::ShortcutsChanged {
            count: self.store.len(),
        });
    }

    fn status(&self) -> AppStatus {
        AppStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            window_visible: self.visibility.is_shown(),
            hotkey: self.settings.global_hotkey.clone(),
            hotkey_registered: self.registrar.is_registered(),
            hotkey_state: self.registrar.state().to_string(),
            shortcut_count: self.store.len(),
            shortcut_source: self.store.source(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    fn emit(&self, event: AppEvent) {
        debug!(%event, "emitting app event");
        let _ = self.event_tx.send(event);
    }
}
