// Collaborators the dispatcher acts through
pub mod launcher;
pub mod prompt;
pub mod settings;

pub use launcher::{LaunchError, LaunchOutcome, LaunchRequest, ProcessLauncher, SystemLauncher};
pub use prompt::{ConsolePrompt, Prompt};
pub use settings::{CatalogFileSurface, SettingsSurface};
