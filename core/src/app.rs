use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::actions::{CatalogFileSurface, ConsolePrompt, SystemLauncher};
use crate::catalog::Catalog;
use crate::config::LauncherConfig;
use crate::dispatcher::{Dispatcher, Flow};
use crate::error::Result;
use crate::instance::{InstanceGuard, InstanceRole};
use crate::ipc::client::send_command;
use crate::ipc::command::CommandRequest;
use crate::ipc::receiver;
use crate::ipc::server::ChannelServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    Command(CommandRequest),
    Shutdown(ShutdownReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `/exit` was dispatched.
    ExitCommand,
    /// Ctrl-C or a session/termination signal.
    Signal,
    /// Every event sender is gone.
    QueueClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ExitCommand => "exit command",
            Self::Signal => "termination signal",
            Self::QueueClosed => "event queue closed",
        };
        f.write_str(text)
    }
}

pub type EventSender = UnboundedSender<AppEvent>;

pub fn events() -> (EventSender, UnboundedReceiver<AppEvent>) {
    mpsc::unbounded_channel()
}

/// The command-execution context: drains the event queue in order and runs
/// each request to completion before taking the next.
///
/// Only the thread calling `run` touches the catalog and the UI
/// collaborators; everyone else posts `AppEvent`s through `sender`.
pub struct Executor {
    dispatcher: Dispatcher,
    events: UnboundedReceiver<AppEvent>,
    // Keeps the queue open after the listener and signal handler are gone.
    own_sender: EventSender,
}

impl Executor {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let (own_sender, receiver) = events();
        Self {
            dispatcher,
            events: receiver,
            own_sender,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.own_sender.clone()
    }

    /// Block the calling thread until a shutdown is requested.
    pub fn run(&mut self) -> ShutdownReason {
        while let Some(event) = self.events.blocking_recv() {
            match event {
                AppEvent::Command(request) => {
                    if self.dispatcher.execute(request) == Flow::Exit {
                        return ShutdownReason::ExitCommand;
                    }
                }
                AppEvent::Shutdown(reason) => return reason,
            }
        }
        ShutdownReason::QueueClosed
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }
}

/// Entry point shared by every launch of the executable.
///
/// `command_line` is the raw argument string, if any. Errors returned
/// here are setup failures; everything after startup is handled in place.
pub fn run(config: LauncherConfig, command_line: Option<String>) -> Result<()> {
    let guard = InstanceGuard::acquire(&config.instance_name)?;

    match guard.role() {
        InstanceRole::Secondary => {
            drop(guard);
            forward(&config, command_line.as_deref().unwrap_or_default());
            Ok(())
        }
        InstanceRole::Primary => run_primary(&config, guard, command_line),
    }
}

/// Hand the request to the primary instance. Failures are logged only; the
/// secondary exits either way.
fn forward(config: &LauncherConfig, command_line: &str) {
    info!("Another instance is running, forwarding '{}'", command_line);
    if let Err(e) = send_command(config.channel_port, command_line, config.connect_timeout) {
        warn!("Could not forward command: {}", e);
    }
}

fn run_primary(config: &LauncherConfig, guard: InstanceGuard, command_line: Option<String>) -> Result<()> {
    let server = ChannelServer::bind(config.channel_port)?;

    let dispatcher = Dispatcher::new(
        Catalog::load(config.catalog_path()),
        Box::new(SystemLauncher::new(config.elevation_wrapper.clone())),
        Box::new(ConsolePrompt),
        Some(Box::new(CatalogFileSurface::new(config.catalog_path()))),
        &config.download_dir,
    );
    let mut executor = Executor::new(dispatcher);
    install_signal_handler(executor.sender());

    // The startup argument is handled before other instances can be heard.
    let startup_flow = match command_line.as_deref().map(str::trim) {
        Some(line) if !line.is_empty() => executor.dispatcher_mut().dispatch(line),
        _ => {
            info!("Started without a command");
            Flow::Continue
        }
    };

    let reason = if startup_flow == Flow::Exit {
        ShutdownReason::ExitCommand
    } else {
        let listener = match receiver::spawn(server, executor.sender()) {
            Ok(listener) => Some(listener),
            Err(e) => {
                error!("Cannot start command listener, running without it: {}", e);
                None
            }
        };
        let reason = executor.run();
        if let Some(listener) = listener {
            listener.stop();
        }
        reason
    };

    shutdown(guard, reason);
    Ok(())
}

/// The one place the primary winds down.
fn shutdown(guard: InstanceGuard, reason: ShutdownReason) {
    info!("Shutting down: {}", reason);
    guard.release();
}

/// Route Ctrl-C and termination into the event queue. A second signal exits
/// at once, abandoning whatever prompt is pending.
fn install_signal_handler(events: EventSender) {
    let signalled = Arc::new(AtomicBool::new(false));
    let result = ctrlc::set_handler(move || {
        if signalled.swap(true, Ordering::SeqCst) {
            eprintln!("\n[OneClickRunner] Forced exit");
            std::process::exit(130);
        }
        eprintln!("\n[OneClickRunner] Shutdown signal received");
        let _ = events.send(AppEvent::Shutdown(ShutdownReason::Signal));
    });

    if let Err(e) = result {
        warn!("Cannot install signal handler: {}", e);
    }
}
