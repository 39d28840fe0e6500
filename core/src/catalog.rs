use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::ipc::command::InteractiveKind;

/// Reserved id of the built-in "yt-dlp Download" target.
pub const DOWNLOAD_TARGET_ID: Uuid = Uuid::from_u128(0x6f0e_1c2a_9d4b_4e7a_b1c3_0a5d_77e2_f019);
pub const DOWNLOAD_TARGET_NAME: &str = "yt-dlp Download";
pub const DOWNLOAD_PROGRAM: &str = "yt-dlp";

/// A launchable entry.
///
/// Stored with PascalCase keys; snake_case keys are accepted on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunTarget {
    #[serde(alias = "id")]
    pub id: Uuid,
    #[serde(default, alias = "name")]
    pub name: String,
    #[serde(default, alias = "path")]
    pub path: String,
    #[serde(default, alias = "arguments")]
    pub arguments: String,
    #[serde(default, alias = "working_directory")]
    pub working_directory: String,
    #[serde(default, rename = "RunAsAdmin", alias = "run_as_admin", alias = "elevate")]
    pub elevate: bool,
}

impl RunTarget {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: path.into(),
            arguments: String::new(),
            working_directory: String::new(),
            elevate: false,
        }
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn with_elevate(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    /// The built-in target that asks for a link before running yt-dlp.
    pub fn download_prompt() -> Self {
        Self {
            id: DOWNLOAD_TARGET_ID,
            name: DOWNLOAD_TARGET_NAME.to_string(),
            path: DOWNLOAD_PROGRAM.to_string(),
            arguments: String::new(),
            working_directory: String::new(),
            elevate: false,
        }
    }

    /// Targets that need user input before they can be launched.
    pub fn interactive_kind(&self) -> Option<InteractiveKind> {
        (self.id == DOWNLOAD_TARGET_ID).then_some(InteractiveKind::DownloadLink)
    }
}

/// The run target list persisted in `config.json`.
pub struct Catalog {
    path: PathBuf,
    items: Vec<RunTarget>,
    builtins: Vec<RunTarget>,
    loaded_mtime: Option<SystemTime>,
}

impl Catalog {
    /// Load the catalog from `path`.
    ///
    /// A missing file is an empty catalog. A file that cannot be read or
    /// parsed is logged and also treated as empty, so a broken catalog never
    /// keeps the launcher from starting.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut catalog = Self {
            path,
            items: Vec::new(),
            builtins: vec![RunTarget::download_prompt()],
            loaded_mtime: None,
        };
        catalog.reload();
        catalog
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all targets: persisted entries in insertion order, then
    /// the built-in ones.
    pub fn get_all(&self) -> Vec<RunTarget> {
        self.items
            .iter()
            .chain(self.builtins.iter())
            .cloned()
            .collect()
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<&RunTarget> {
        self.items
            .iter()
            .chain(self.builtins.iter())
            .find(|t| t.id == id)
    }

    pub fn add(&mut self, target: RunTarget) {
        if self.builtins.iter().any(|b| b.id == target.id) {
            warn!("Refusing to add target with reserved id {}", target.id);
            return;
        }
        info!("Adding target '{}' ({})", target.name, target.id);
        self.items.push(target);
        self.persist();
    }

    /// Replace the entry with the same id. Unknown ids are ignored.
    pub fn update(&mut self, target: RunTarget) {
        match self.items.iter_mut().find(|t| t.id == target.id) {
            Some(slot) => {
                info!("Updating target '{}' ({})", target.name, target.id);
                *slot = target;
                self.persist();
            }
            None => warn!("Cannot update unknown target {}", target.id),
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        if self.items.len() != before {
            info!("Removed target {}", id);
            self.persist();
        }
    }

    /// Reload from disk when the file changed since the last load.
    ///
    /// Returns true when a reload happened.
    pub fn refresh_if_changed(&mut self) -> bool {
        let current = file_mtime(&self.path);
        if current == self.loaded_mtime {
            return false;
        }
        info!("Catalog file changed, reloading {}", self.path.display());
        self.reload();
        true
    }

    /// Write the catalog, creating the data directory when needed.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.items)?;
        fs::write(&self.path, json)?;
        self.loaded_mtime = file_mtime(&self.path);
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(e) = self.save() {
            warn!("Error saving catalog {}: {}", self.path.display(), e);
        }
    }

    fn reload(&mut self) {
        self.loaded_mtime = file_mtime(&self.path);
        self.items = match read_items(&self.path) {
            Ok(items) => items,
            Err(e) => {
                warn!("Error loading catalog {}: {}", self.path.display(), e);
                Vec::new()
            }
        };
    }
}

fn read_items(path: &Path) -> Result<Vec<RunTarget>> {
    match fs::read_to_string(path) {
        Ok(json) if json.trim().is_empty() => Ok(Vec::new()),
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
