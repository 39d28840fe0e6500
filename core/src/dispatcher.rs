use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};
use uuid::Uuid;

use crate::actions::{LaunchRequest, ProcessLauncher, Prompt, SettingsSurface};
use crate::catalog::{Catalog, RunTarget, DOWNLOAD_TARGET_ID};
use crate::ipc::command::{CommandRequest, InteractiveKind};

/// What the execution context should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// How a run request decides on elevation.
///
/// Runs requested by command line (startup argument or forwarded from a
/// secondary) always ask for elevation, while a run picked interactively
/// honors the target's stored flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationPolicy {
    Always,
    AsStored,
}

impl ElevationPolicy {
    fn resolve(self, target: &RunTarget) -> bool {
        match self {
            Self::Always => true,
            Self::AsStored => target.elevate,
        }
    }
}

/// Executes commands against the live catalog. Failures are logged and
/// swallowed; dispatching never fails.
pub struct Dispatcher {
    catalog: Catalog,
    launcher: Box<dyn ProcessLauncher>,
    prompt: Box<dyn Prompt>,
    settings: Option<Box<dyn SettingsSurface>>,
    download_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(
        catalog: Catalog,
        launcher: Box<dyn ProcessLauncher>,
        prompt: Box<dyn Prompt>,
        settings: Option<Box<dyn SettingsSurface>>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            launcher,
            prompt,
            settings,
            download_dir: download_dir.into(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Parse and execute a raw command line. Unrecognized input is a no-op.
    pub fn dispatch(&mut self, raw: &str) -> Flow {
        match CommandRequest::parse(raw) {
            Ok(request) => self.execute(request),
            Err(e) => {
                warn!("Ignoring command: {}", e);
                Flow::Continue
            }
        }
    }

    pub fn execute(&mut self, request: CommandRequest) -> Flow {
        info!("Executing command: {}", request);
        match request {
            CommandRequest::Exit => Flow::Exit,
            CommandRequest::ShowSettings => {
                self.show_settings();
                Flow::Continue
            }
            CommandRequest::RunById(id) => {
                self.run_by_id(id, ElevationPolicy::Always);
                Flow::Continue
            }
            CommandRequest::SpecialInteractive(kind) => {
                self.run_interactive(kind);
                Flow::Continue
            }
        }
    }

    /// The interactive "Run" action: the target's own elevation flag applies.
    pub fn run_selected(&mut self, id: Uuid) {
        self.run_by_id(id, ElevationPolicy::AsStored);
    }

    fn show_settings(&mut self) {
        match self.settings.as_mut() {
            Some(surface) => {
                if let Err(e) = surface.bring_to_front() {
                    warn!("Cannot show settings: {}", e);
                }
            }
            None => info!("No settings surface available"),
        }
    }

    fn run_by_id(&mut self, id: Uuid, policy: ElevationPolicy) {
        self.catalog.refresh_if_changed();

        let Some(target) = self.catalog.find_by_id(id).cloned() else {
            info!("Target {} not in catalog, ignoring", id);
            return;
        };

        if let Some(kind) = target.interactive_kind() {
            self.run_interactive(kind);
            return;
        }

        let request = LaunchRequest {
            program: target.path.clone(),
            arguments: target.arguments.clone(),
            extra_args: Vec::new(),
            working_dir: non_empty_dir(&target.working_directory),
            elevate: policy.resolve(&target),
        };
        info!("Running '{}' ({})", target.name, target.id);
        self.launch(&target.name, &request);
    }

    fn run_interactive(&mut self, kind: InteractiveKind) {
        match kind {
            InteractiveKind::DownloadLink => self.run_download_prompt(),
        }
    }

    fn run_download_prompt(&mut self) {
        let target = self
            .catalog
            .find_by_id(DOWNLOAD_TARGET_ID)
            .cloned()
            .unwrap_or_else(RunTarget::download_prompt);

        let link = match self.prompt.ask(&target.name, "Enter the link to download") {
            Some(link) if !link.trim().is_empty() => link.trim().to_string(),
            Some(_) => {
                info!("Download cancelled: empty link");
                return;
            }
            None => {
                info!("Download cancelled by user");
                return;
            }
        };

        if let Err(e) = fs::create_dir_all(&self.download_dir) {
            error!(
                "Cannot create download directory {}: {}",
                self.download_dir.display(),
                e
            );
            return;
        }

        let request = LaunchRequest {
            program: target.path.clone(),
            arguments: target.arguments.clone(),
            extra_args: vec![link],
            working_dir: Some(self.download_dir.clone()),
            elevate: false,
        };
        self.launch(&target.name, &request);
    }

    fn launch(&mut self, name: &str, request: &LaunchRequest) {
        match self.launcher.launch(request) {
            Ok(outcome) => match outcome.pid {
                Some(pid) => info!("Started '{}' (pid {})", name, pid),
                None => info!("Started '{}'", name),
            },
            Err(e) => error!("Failed to run '{}': {}", name, e),
        }
    }
}

fn non_empty_dir(dir: &str) -> Option<PathBuf> {
    let dir = dir.trim();
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}
