use std::fmt;

use uuid::Uuid;

use crate::error::{LauncherError, Result};

pub const EXIT: &str = "/exit";
pub const SETTINGS: &str = "/settings";
pub const RUN_PREFIX: &str = "/run:";

/// Built-in targets that prompt for input before launching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractiveKind {
    /// Ask for a link and hand it to yt-dlp.
    DownloadLink,
}

/// One parsed command, from the argument vector or the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequest {
    RunById(Uuid),
    ShowSettings,
    Exit,
    SpecialInteractive(InteractiveKind),
}

impl CommandRequest {
    /// Parse a raw command line.
    ///
    /// Surrounding whitespace (including the channel's line terminator) is
    /// ignored; everything else must match exactly.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw == EXIT {
            return Ok(Self::Exit);
        }
        if raw == SETTINGS {
            return Ok(Self::ShowSettings);
        }
        if let Some(rest) = raw.strip_prefix(RUN_PREFIX) {
            return Uuid::parse_str(rest)
                .map(Self::RunById)
                .map_err(|e| LauncherError::InvalidCommand(format!("bad target id '{}': {}", rest, e)));
        }

        Err(LauncherError::InvalidCommand(format!("unrecognized command '{}'", raw)))
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunById(id) => write!(f, "run {}", id),
            Self::ShowSettings => write!(f, "show settings"),
            Self::Exit => write!(f, "exit"),
            Self::SpecialInteractive(kind) => write!(f, "interactive {:?}", kind),
        }
    }
}
