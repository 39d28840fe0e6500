//! System-wide single-instance lock.

use log::info;
use single_instance::SingleInstance;

use crate::error::{LauncherError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    Primary,
    Secondary,
}

pub struct InstanceGuard {
    name: String,
    role: InstanceRole,
    _lock: SingleInstance,
}

impl InstanceGuard {
    /// Make one attempt to take the lock named `name`.
    ///
    /// Errors only when the lock cannot be created at all, which is fatal for
    /// startup.
    pub fn acquire(name: &str) -> Result<Self> {
        let lock = SingleInstance::new(&lock_name(name)).map_err(|e| LauncherError::InstanceLock {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let role = if lock.is_single() {
            InstanceRole::Primary
        } else {
            InstanceRole::Secondary
        };
        info!("Instance lock '{}': {:?}", name, role);

        Ok(Self {
            name: name.to_string(),
            role,
            _lock: lock,
        })
    }

    pub fn role(&self) -> InstanceRole {
        self.role
    }

    /// Release the lock. Dropping the guard does the same.
    pub fn release(self) {}
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if self.role == InstanceRole::Primary {
            info!("Instance lock '{}' released", self.name);
        }
    }
}

// macOS implements the lock with a file, so the name has to be a path.
#[cfg(target_os = "macos")]
fn lock_name(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("{}.lock", name))
        .to_string_lossy()
        .into_owned()
}

#[cfg(not(target_os = "macos"))]
fn lock_name(name: &str) -> String {
    name.to_string()
}
