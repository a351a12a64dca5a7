pub mod config;
pub mod session;
pub mod settings;

pub use config::Config;
pub use session::{FilterSettings, LoadState, SelectionError, Session, WalkEvent};
pub use settings::{normalize_root, DirectorySettings, SettingsStore};
