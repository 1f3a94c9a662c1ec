//! Hotkey module for global keyboard shortcuts
//!
//! Parses mask hotkey settings and registers them with the OS through the
//! `global-hotkey` crate. Each binding gets its own key-down channel.
//! The OS hotkey manager lives on a dedicated thread that runs the
//! platform event loop (a Win32 message pump on Windows).

mod keys;
mod listener;

pub use keys::Binding;
pub use listener::HotkeyListener;

/// Errors that can occur while parsing or registering hotkeys
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("unsupported key {0:?}")]
    UnknownKey(String),

    #[error("unsupported modifier {0:?}")]
    UnknownModifier(String),

    #[error("failed to create hotkey manager: {0}")]
    Manager(global_hotkey::Error),

    #[error("failed to register hotkey {binding}: {source}")]
    Register {
        binding: String,
        source: global_hotkey::Error,
    },

    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("hotkey manager thread is not running")]
    ManagerStopped,

    #[error("failed to spawn hotkey thread: {0}")]
    ThreadSpawn(String),
}
