//! Platform hotkey backends
//!
//! On Windows the binding lives on a dedicated thread that owns a message
//! queue: `RegisterHotKey` with no window binds to the calling thread, and
//! `WM_HOTKEY` is read back from that thread's queue. Elsewhere the backend
//! refuses registration, which the app treats like any other refusal.

use tokio::sync::mpsc;

use super::combo::HotkeyCombination;
use super::registrar::{HotkeyBackend, HotkeyError, HotkeyEvent};

#[cfg(windows)]
pub use self::win32::Win32Backend as PlatformBackend;

#[cfg(not(windows))]
pub use self::UnsupportedBackend as PlatformBackend;

/// Backend for platforms without a global hotkey implementation
#[cfg_attr(windows, allow(dead_code))]
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl HotkeyBackend for UnsupportedBackend {
    fn register(
        &mut self,
        _id: i32,
        _combination: HotkeyCombination,
        _events: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError> {
        Err(HotkeyError::Unsupported)
    }

    fn unregister(&mut self, _id: i32) {}
}

#[cfg(windows)]
mod win32 {
    use std::ptr;
    use std::sync::mpsc as std_mpsc;
    use std::thread::{self, JoinHandle};

    use tokio::sync::mpsc;
    use tracing::{debug, info, warn};
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::Threading::GetCurrentThreadId;
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_NOREPEAT,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_HOTKEY, WM_QUIT,
        WM_USER,
    };

    use super::{HotkeyBackend, HotkeyCombination, HotkeyError, HotkeyEvent};

    struct Listener {
        thread_id: u32,
        handle: JoinHandle<()>,
    }

    /// `RegisterHotKey` on a dedicated message-pump thread
    #[derive(Default)]
    pub struct Win32Backend {
        listener: Option<Listener>,
    }

    impl HotkeyBackend for Win32Backend {
        fn register(
            &mut self,
            id: i32,
            combination: HotkeyCombination,
            events: mpsc::Sender<HotkeyEvent>,
        ) -> Result<(), HotkeyError> {
            self.unregister(id);
            let vk = combination
                .virtual_key()
                .ok_or(HotkeyError::NoKeyCode(combination))?;

            let (ready_tx, ready_rx) = std_mpsc::channel();
            let handle = thread::Builder::new()
                .name("hotkey-listener".to_string())
                .spawn(move || run_message_loop(id, combination, vk, events, ready_tx))
                .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(thread_id)) => {
                    self.listener = Some(Listener { thread_id, handle });
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = handle.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = handle.join();
                    Err(HotkeyError::ListenerGone)
                }
            }
        }

        fn unregister(&mut self, _id: i32) {
            let Some(listener) = self.listener.take() else {
                return;
            };
            // SAFETY: posting to a thread id we own; failure only means the
            // thread already exited.
            let posted = unsafe { PostThreadMessageW(listener.thread_id, WM_QUIT, 0, 0) };
            if posted == 0 {
                debug!("hotkey listener already gone");
            }
            if listener.handle.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
        }
    }

    fn run_message_loop(
        id: i32,
        combination: HotkeyCombination,
        vk: u32,
        events: mpsc::Sender<HotkeyEvent>,
        ready: std_mpsc::Sender<Result<u32, HotkeyError>>,
    ) {
        // SAFETY: plain Win32 calls on this thread's own queue; `msg` is a
        // POD out-parameter.
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            // Make sure the queue exists before the thread id is handed out
            PeekMessageW(&mut msg, ptr::null_mut(), WM_USER, WM_USER, PM_NOREMOVE);

            let modifiers = combination.modifiers.bits() | MOD_NOREPEAT;
            if RegisterHotKey(ptr::null_mut(), id, modifiers, vk) == 0 {
                let code = GetLastError();
                let _ = ready.send(Err(HotkeyError::Refused { combination, code }));
                return;
            }

            let _ = ready.send(Ok(GetCurrentThreadId()));
            info!(%combination, "hotkey listener thread started");

            loop {
                // 0 is WM_QUIT, -1 is an error
                let status = GetMessageW(&mut msg, ptr::null_mut(), 0, 0);
                if status == 0 || status == -1 {
                    break;
                }
                if msg.message == WM_HOTKEY && msg.wParam == id as usize {
                    if events.blocking_send(HotkeyEvent::Pressed { id }).is_err() {
                        warn!("failed to send hotkey event - channel closed?");
                        break;
                    }
                }
            }

            UnregisterHotKey(ptr::null_mut(), id);
        }
        info!("hotkey listener thread stopped");
    }
}
