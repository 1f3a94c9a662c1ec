//! Global hotkey listener
//!
//! Registers one OS hotkey per mask and fans key-down events out to one
//! channel per binding.
//!
//! Two threads are involved. The manager thread creates the OS hotkey
//! manager, performs every (un)registration, and keeps the platform's event
//! loop running; on Windows that is a Win32 message pump, without which no
//! `WM_HOTKEY` is ever delivered. The dispatch thread reads the manager's
//! global event receiver and routes presses to their bindings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::keys::Binding;
use super::HotkeyError;

/// Pending key-downs a binding may queue while a toggle is in progress
const BINDING_QUEUE: usize = 32;

/// How often the dispatcher checks whether it should stop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const MANAGER_THREAD: &str = "hotkey-manager";

/// Senders keyed by hotkey id
type Routes = Arc<Mutex<HashMap<u32, mpsc::Sender<()>>>>;

/// OS hotkey registration, as done by [`GlobalHotKeyManager`]
trait Registrar {
    fn register(&self, hotkey: HotKey) -> Result<(), global_hotkey::Error>;
    fn unregister_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error>;
}

impl Registrar for GlobalHotKeyManager {
    fn register(&self, hotkey: HotKey) -> Result<(), global_hotkey::Error> {
        GlobalHotKeyManager::register(self, hotkey)
    }

    fn unregister_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error> {
        GlobalHotKeyManager::unregister_all(self, hotkeys)
    }
}

/// Requests served by the manager thread
enum Command {
    Register(HotKey, std_mpsc::SyncSender<Result<(), global_hotkey::Error>>),
    Stop,
}

/// Handle to the thread that owns the hotkey manager
struct ManagerThread {
    commands: std_mpsc::Sender<Command>,
    /// Win32 id of the manager thread; 0 on other platforms
    thread_id: u32,
    handle: Option<JoinHandle<()>>,
}

impl ManagerThread {
    /// Spawn the thread and wait until `create` has run on it
    fn spawn<R, F>(create: F) -> Result<Self, HotkeyError>
    where
        R: Registrar,
        F: FnOnce() -> Result<R, global_hotkey::Error> + Send + 'static,
    {
        let (commands, requests) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        let handle = thread::Builder::new()
            .name(MANAGER_THREAD.to_string())
            .spawn(move || run_manager(create, requests, ready_tx))
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        let thread_id = match ready_rx.recv() {
            Ok(Ok(thread_id)) => thread_id,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(HotkeyError::Manager(e));
            }
            Err(_) => return Err(HotkeyError::ManagerStopped),
        };

        Ok(Self {
            commands,
            thread_id,
            handle: Some(handle),
        })
    }

    fn send(&self, command: Command) -> Result<(), HotkeyError> {
        self.commands
            .send(command)
            .map_err(|_| HotkeyError::ManagerStopped)?;
        platform::wake(self.thread_id);
        Ok(())
    }

    fn register(&self, binding: &Binding) -> Result<(), HotkeyError> {
        let (reply_tx, reply_rx) = std_mpsc::sync_channel(1);
        self.send(Command::Register(binding.hotkey, reply_tx))?;
        match reply_rx.recv() {
            Ok(result) => result.map_err(|source| HotkeyError::Register {
                binding: binding.to_string(),
                source,
            }),
            Err(_) => Err(HotkeyError::ManagerStopped),
        }
    }

    /// Unregister everything and wait for the thread to exit
    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.send(Command::Stop).is_err() {
            debug!("hotkey manager thread already gone");
        }
        if handle.join().is_err() {
            warn!("hotkey manager thread panicked");
        }
    }
}

impl Drop for ManagerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Body of the manager thread
fn run_manager<R, F>(
    create: F,
    requests: std_mpsc::Receiver<Command>,
    ready: std_mpsc::SyncSender<Result<u32, global_hotkey::Error>>,
) where
    R: Registrar,
    F: FnOnce() -> Result<R, global_hotkey::Error>,
{
    // The queue has to exist before anyone posts to it
    platform::init_queue();

    let manager = match create() {
        Ok(manager) => manager,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(platform::current_thread_id())).is_err() {
        return;
    }
    info!("hotkey manager thread started");

    let mut registered = Vec::new();
    platform::pump(&requests, |command| match command {
        Command::Register(hotkey, reply) => {
            let result = manager.register(hotkey);
            if result.is_ok() {
                registered.push(hotkey);
            }
            let _ = reply.send(result);
            true
        }
        Command::Stop => false,
    });

    if let Err(e) = manager.unregister_all(&registered) {
        warn!(error = %e, "failed to unregister hotkeys");
    }
    info!("hotkey manager thread stopped");
}

#[cfg(not(windows))]
mod platform {
    use std::sync::mpsc::Receiver;

    use super::Command;

    pub fn init_queue() {}

    pub fn current_thread_id() -> u32 {
        0
    }

    /// Commands arrive on the channel itself, no wakeup needed
    pub fn wake(_thread_id: u32) {}

    /// Serve commands until `handle` returns false or every sender is gone
    pub fn pump(requests: &Receiver<Command>, mut handle: impl FnMut(Command) -> bool) {
        while let Ok(command) = requests.recv() {
            if !handle(command) {
                break;
            }
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::ptr;
    use std::sync::mpsc::{Receiver, TryRecvError};

    use tracing::warn;
    use windows_sys::Win32::System::Threading::GetCurrentThreadId;
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW, TranslateMessage, MSG,
        PM_NOREMOVE, WM_APP, WM_USER,
    };

    use super::Command;

    /// Thread message telling the pump to drain the command channel
    const WM_COMMAND_READY: u32 = WM_APP + 1;

    pub fn init_queue() {
        // Any message call creates the thread's queue
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            PeekMessageW(&mut msg, ptr::null_mut(), WM_USER, WM_USER, PM_NOREMOVE);
        }
    }

    pub fn current_thread_id() -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    pub fn wake(thread_id: u32) {
        let posted = unsafe { PostThreadMessageW(thread_id, WM_COMMAND_READY, 0, 0) };
        if posted == 0 {
            warn!(thread_id, "failed to wake hotkey manager thread");
        }
    }

    /// Win32 message loop; `WM_HOTKEY` reaches the manager's window from here
    pub fn pump(requests: &Receiver<Command>, mut handle: impl FnMut(Command) -> bool) {
        let mut msg: MSG = unsafe { std::mem::zeroed() };
        loop {
            // 0 means WM_QUIT, -1 an error
            let status = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
            if status <= 0 {
                if status < 0 {
                    warn!("GetMessageW failed, stopping hotkey message loop");
                }
                return;
            }

            if msg.hwnd.is_null() && msg.message == WM_COMMAND_READY {
                loop {
                    match requests.try_recv() {
                        Ok(command) => {
                            if !handle(command) {
                                return;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return,
                    }
                }
                continue;
            }

            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

/// Owns the OS hotkey registrations and the dispatch thread
pub struct HotkeyListener {
    manager: ManagerThread,
    registered: usize,
    routes: Routes,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a listener with no bindings
    pub fn new() -> Result<Self, HotkeyError> {
        Self::with_manager(GlobalHotKeyManager::new)
    }

    fn with_manager<R, F>(create: F) -> Result<Self, HotkeyError>
    where
        R: Registrar,
        F: FnOnce() -> Result<R, global_hotkey::Error> + Send + 'static,
    {
        Ok(Self {
            manager: ManagerThread::spawn(create)?,
            registered: 0,
            routes: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register a binding; the receiver yields one `()` per key-down
    pub fn register(&mut self, binding: &Binding) -> Result<mpsc::Receiver<()>, HotkeyError> {
        self.manager.register(binding)?;
        self.registered += 1;

        let (tx, rx) = mpsc::channel(BINDING_QUEUE);
        lock_routes(&self.routes).insert(binding.id(), tx);

        debug!(mask = %binding.mask, hotkey = %binding, id = binding.id(), "hotkey registered");
        Ok(rx)
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Start the dispatch thread
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let routes = Arc::clone(&self.routes);
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("hotkey-dispatch".to_string())
            .spawn(move || {
                info!("hotkey dispatch thread started");
                run_dispatch(&routes, &running);
                running.store(false, Ordering::SeqCst);
                info!("hotkey dispatch thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Stop dispatching and unregister every hotkey
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.manager.shutdown();
        self.registered = 0;
        lock_routes(&self.routes).clear();
    }
}

fn lock_routes(routes: &Routes) -> std::sync::MutexGuard<'_, HashMap<u32, mpsc::Sender<()>>> {
    // A panic while holding the lock leaves the map itself intact
    routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forward events until stopped or the event source goes away
fn run_dispatch(routes: &Routes, running: &AtomicBool) {
    let receiver = GlobalHotKeyEvent::receiver();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                route(&lock_routes(routes), event.id, event.state);
            }
            Err(e) if e.is_timeout() => {}
            Err(_) => {
                warn!("hotkey event source disconnected");
                break;
            }
        }
    }
}

/// Deliver a key-down to its binding's channel.
///
/// Returns whether the event was delivered.
fn route(routes: &HashMap<u32, mpsc::Sender<()>>, id: u32, state: HotKeyState) -> bool {
    if state != HotKeyState::Pressed {
        trace!(id, "ignoring key release");
        return false;
    }

    let Some(tx) = routes.get(&id) else {
        debug!(id, "event for unknown hotkey");
        return false;
    };

    match tx.try_send(()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(())) => {
            warn!(id, "hotkey queue full, dropping key press");
            false
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            debug!(id, "hotkey handler gone");
            false
        }
    }
}
