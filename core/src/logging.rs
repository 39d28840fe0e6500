use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Send `log` records to the append-only activity log, or stderr when the
/// file cannot be opened.
pub fn init(log_path: &Path) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - [{}] {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            record.level(),
            record.args()
        )
    });

    match open_append(log_path) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!(
                "[OneClickRunner] Cannot open log file {}: {}",
                log_path.display(),
                e
            );
            builder.target(Target::Stderr);
        }
    }

    let _ = builder.try_init();
}

fn open_append(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
