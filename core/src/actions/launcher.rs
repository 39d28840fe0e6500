use std::io;
use std::path::PathBuf;
#[cfg(not(windows))]
use std::process::{Command, Stdio};

use log::{debug, info};

/// Everything needed to start one external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    /// Argument string as stored in the catalog.
    pub arguments: String,
    /// Extra arguments appended verbatim after `arguments`.
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub elevate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Not available for shell-executed launches.
    pub pid: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Program not found: {0}")]
    NotFound(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Elevation was declined for {0}")]
    ElevationDeclined(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Process-launch collaborator used by the dispatcher.
pub trait ProcessLauncher {
    fn launch(&mut self, request: &LaunchRequest) -> Result<LaunchOutcome, LaunchError>;
}

/// Launches through the operating system.
///
/// On Windows this is `ShellExecuteW`, with the `runas` verb for elevated
/// requests. Elsewhere the program is spawned directly and elevated requests
/// are prefixed with the configured wrapper (e.g. `pkexec`).
pub struct SystemLauncher {
    #[cfg_attr(windows, allow(dead_code))]
    elevation_wrapper: Option<String>,
}

impl SystemLauncher {
    pub fn new(elevation_wrapper: Option<String>) -> Self {
        Self { elevation_wrapper }
    }
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&mut self, request: &LaunchRequest) -> Result<LaunchOutcome, LaunchError> {
        info!(
            "Launching {} (elevate: {}, cwd: {:?})",
            request.program, request.elevate, request.working_dir
        );

        #[cfg(windows)]
        {
            shell_execute(request)
        }

        #[cfg(not(windows))]
        {
            self.spawn_unix(request)
        }
    }
}

#[cfg(not(windows))]
impl SystemLauncher {
    fn spawn_unix(&self, request: &LaunchRequest) -> Result<LaunchOutcome, LaunchError> {
        let mut args = split_arguments(&request.arguments)?;
        args.extend(request.extra_args.iter().cloned());

        let wrapper = match &self.elevation_wrapper {
            Some(wrapper) if request.elevate && !running_as_root() => Some(wrapper),
            _ => None,
        };

        let mut command = match wrapper {
            Some(wrapper) => {
                debug!("Elevating {} through {}", request.program, wrapper);
                let mut command = Command::new(wrapper);
                command.arg(&request.program);
                command
            }
            None => Command::new(&request.program),
        };
        command.args(&args).stdin(Stdio::null());
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound(request.program.clone()),
            _ => LaunchError::Spawn {
                program: request.program.clone(),
                source: e,
            },
        })?;
        let pid = child.id();

        // Reap the child so finished launches don't linger as zombies.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(LaunchOutcome { pid: Some(pid) })
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(all(not(unix), not(windows)))]
fn running_as_root() -> bool {
    false
}

/// Split a stored argument string the way a shell would for plain words
/// and double-quoted groups.
pub fn split_arguments(input: &str) -> Result<Vec<String>, LaunchError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quotes = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_word = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some(next @ ('"' | '\\')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            c if c.is_whitespace() && !in_quotes => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_quotes {
        return Err(LaunchError::InvalidArguments(format!(
            "unbalanced quote in '{}'",
            input
        )));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

#[cfg(windows)]
fn encode_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Quote one argument for a Windows command line.
#[cfg_attr(not(windows), allow(dead_code))]
fn quote_windows_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}

/// Parameter string for `ShellExecuteW`: the stored arguments untouched,
/// followed by the quoted extra arguments.
#[cfg_attr(not(windows), allow(dead_code))]
fn windows_parameters(request: &LaunchRequest) -> String {
    let mut params = request.arguments.trim().to_string();
    for arg in &request.extra_args {
        if !params.is_empty() {
            params.push(' ');
        }
        params.push_str(&quote_windows_arg(arg));
    }
    params
}

#[cfg(windows)]
fn shell_execute(request: &LaunchRequest) -> Result<LaunchOutcome, LaunchError> {
    use windows_sys::Win32::Foundation::{GetLastError, ERROR_CANCELLED};
    use windows_sys::Win32::UI::Shell::ShellExecuteW;
    use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let verb = encode_wide(if request.elevate { "runas" } else { "open" });
    let file = encode_wide(&request.program);
    let params = encode_wide(&windows_parameters(request));
    let dir = request
        .working_dir
        .as_ref()
        .map(|d| encode_wide(&d.to_string_lossy()));

    let result = unsafe {
        ShellExecuteW(
            0,
            verb.as_ptr(),
            file.as_ptr(),
            params.as_ptr(),
            dir.as_ref().map_or(std::ptr::null(), |d| d.as_ptr()),
            SW_SHOWNORMAL,
        )
    };

    // Values above 32 mean success.
    if result as isize > 32 {
        return Ok(LaunchOutcome { pid: None });
    }

    let last_error = unsafe { GetLastError() };
    if last_error == ERROR_CANCELLED {
        return Err(LaunchError::ElevationDeclined(request.program.clone()));
    }
    match result as isize {
        // SE_ERR_FNF, SE_ERR_PNF
        2 | 3 => Err(LaunchError::NotFound(request.program.clone())),
        _ => Err(LaunchError::Spawn {
            program: request.program.clone(),
            source: io::Error::from_raw_os_error(last_error as i32),
        }),
    }
}
