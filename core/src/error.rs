/// Error type for launcher setup and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot create instance lock '{name}': {reason}")]
    InstanceLock { name: String, reason: String },

    #[error("Cannot open command channel on port {port}: {source}")]
    ChannelBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot reach running instance on port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
