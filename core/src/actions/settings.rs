use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use log::info;

/// The configuration surface `/settings` brings forward.
pub trait SettingsSurface {
    fn bring_to_front(&mut self) -> io::Result<()>;
}

/// Opens the catalog file with the desktop's default handler.
///
/// The catalog is plain JSON, so the user's editor doubles as the settings
/// window; changes are picked up on the next run request.
pub struct CatalogFileSurface {
    path: PathBuf,
}

impl CatalogFileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_exists(&self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, "[]\n")
    }
}

impl SettingsSurface for CatalogFileSurface {
    fn bring_to_front(&mut self) -> io::Result<()> {
        self.ensure_exists()?;
        info!("Opening settings: {}", self.path.display());

        #[cfg(windows)]
        let mut command = {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        };
        #[cfg(target_os = "macos")]
        let mut command = Command::new("open");
        #[cfg(all(not(windows), not(target_os = "macos")))]
        let mut command = Command::new("xdg-open");

        let mut child = command.arg(&self.path).spawn()?;
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(())
    }
}
