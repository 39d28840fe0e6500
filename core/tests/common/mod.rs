//! Common utilities for OneClickRunner integration tests.
//!
//! Every `TestEnv` gets its own data directory, instance lock name and
//! channel port, so tests can run in parallel without seeing each other or
//! a launcher the developer has running.

#![allow(dead_code)]

use std::fs;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use assert_cmd::Command;
use oneclickrunner::catalog::RunTarget;
pub use tempfile::TempDir;

pub const BIN: &str = env!("CARGO_BIN_EXE_oneclickrunner");

pub struct TestEnv {
    pub data_dir: TempDir,
    pub instance: String,
    pub port: u16,
}

impl TestEnv {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        Self {
            data_dir: TempDir::new().unwrap(),
            instance: format!("oneclickrunner-it-{}-{}", std::process::id(), nanos),
            port: free_port(),
        }
    }

    pub fn path(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn log_path(&self) -> PathBuf {
        self.path().join("activity.log")
    }

    pub fn envs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ONECLICKRUNNER_HOME", self.path().display().to_string()),
            ("ONECLICKRUNNER_INSTANCE", self.instance.clone()),
            ("ONECLICKRUNNER_PORT", self.port.to_string()),
            ("ONECLICKRUNNER_CONNECT_TIMEOUT_MS", "1000".to_string()),
            ("ONECLICKRUNNER_DOWNLOADS", self.path().join("downloads").display().to_string()),
            // `env` stands in for pkexec so elevated test launches run unattended.
            ("ONECLICKRUNNER_ELEVATE_WITH", "env".to_string()),
        ]
    }

    /// A one-shot invocation of the launcher.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(BIN);
        cmd.envs(self.envs());
        cmd.timeout(Duration::from_secs(15));
        cmd
    }

    /// Start a long-running primary instance.
    pub fn spawn_primary(&self, args: &[&str]) -> Child {
        std::process::Command::new(BIN)
            .args(args)
            .envs(self.envs())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("primary should start")
    }

    /// Wait until something accepts connections on the channel port.
    pub fn wait_for_channel(&self) -> bool {
        wait_until(Duration::from_secs(10), || {
            TcpStream::connect((Ipv4Addr::LOCALHOST, self.port)).is_ok()
        })
    }

    pub fn write_catalog(&self, targets: &[RunTarget]) {
        let json = serde_json::to_string_pretty(targets).unwrap();
        fs::write(self.path().join("config.json"), json).unwrap();
    }

    pub fn log_contents(&self) -> String {
        fs::read_to_string(self.log_path()).unwrap_or_default()
    }
}

pub fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}

/// Wait for `child` to exit, killing it if it does not.
pub fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(25));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

/// A target that appends one line to `marker` each time it runs.
#[cfg(unix)]
pub fn marker_target(name: &str, marker: &Path) -> RunTarget {
    RunTarget::new(name, "sh").with_arguments(format!("-c \"echo ran >> {}\"", marker.display()))
}
