use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app::{AppEvent, EventSender};
use crate::ipc::command::CommandRequest;
use crate::ipc::server::{ChannelAcceptor, Wake};

/// Longest accepted command line, in bytes.
pub const MAX_LINE_BYTES: u64 = 8 * 1024;
/// Consecutive accept failures before the endpoint is re-created.
pub const MAX_ACCEPT_FAILURES: u32 = 5;
pub const MAX_RECREATE_ATTEMPTS: u32 = 3;
const RECREATE_BACKOFF: Duration = Duration::from_millis(200);
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Why the listener loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Stopped,
    /// The command-execution context is gone.
    ContextClosed,
    /// The channel could not be re-created; forwarding is unavailable.
    Degraded,
}

pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    wake: Wake,
    thread: JoinHandle<ListenerExit>,
}

impl ListenerHandle {
    /// Ask the loop to stop and wait briefly for it.
    ///
    /// A loop stuck on a slow client is left behind; process exit reclaims it.
    pub fn stop(self) -> Option<ListenerExit> {
        self.stop.store(true, Ordering::SeqCst);
        (self.wake)();

        let deadline = Instant::now() + STOP_GRACE;
        while !self.thread.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        if self.thread.is_finished() {
            self.thread.join().ok()
        } else {
            debug!("Command listener did not stop in time, detaching");
            None
        }
    }

    pub fn join(self) -> Option<ListenerExit> {
        self.thread.join().ok()
    }
}

/// Start the listener on its own thread.
///
/// Each accepted connection carries one line; parsed requests are posted to
/// `events` and the loop goes straight back to accepting.
pub fn spawn<A: ChannelAcceptor>(acceptor: A, events: EventSender) -> io::Result<ListenerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let wake = acceptor.waker();
    let listener = CommandListener {
        acceptor,
        events,
        stop: stop.clone(),
    };

    let thread = thread::Builder::new()
        .name("command-listener".to_string())
        .spawn(move || listener.run())?;

    Ok(ListenerHandle { stop, wake, thread })
}

struct CommandListener<A> {
    acceptor: A,
    events: EventSender,
    stop: Arc<AtomicBool>,
}

impl<A: ChannelAcceptor> CommandListener<A> {
    fn run(mut self) -> ListenerExit {
        let mut failures = 0;

        loop {
            if self.stopped() {
                return ListenerExit::Stopped;
            }

            let conn = match self.acceptor.accept() {
                Ok(conn) => {
                    failures = 0;
                    conn
                }
                Err(e) => {
                    failures += 1;
                    warn!("Command channel accept failed ({}/{}): {}", failures, MAX_ACCEPT_FAILURES, e);
                    if failures >= MAX_ACCEPT_FAILURES {
                        if let Err(e) = self.recreate() {
                            error!(
                                "Command listener stopped, requests from other instances are ignored until restart: {}",
                                e
                            );
                            return ListenerExit::Degraded;
                        }
                        failures = 0;
                    } else {
                        thread::sleep(ACCEPT_RETRY_DELAY);
                    }
                    continue;
                }
            };

            if self.stopped() {
                return ListenerExit::Stopped;
            }

            match read_message(conn) {
                Ok(Some(line)) => {
                    if !self.deliver(&line) {
                        info!("Command-execution context closed, listener exiting");
                        return ListenerExit::ContextClosed;
                    }
                }
                Ok(None) => debug!("Ignoring empty command message"),
                Err(e) => warn!("Dropping command connection: {}", e),
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Parse and post one line. Returns false once nobody is receiving.
    fn deliver(&self, line: &str) -> bool {
        info!("Received command line: {}", line);
        match CommandRequest::parse(line) {
            Ok(request) => self.events.send(AppEvent::Command(request)).is_ok(),
            Err(e) => {
                warn!("Ignoring command: {}", e);
                true
            }
        }
    }

    fn recreate(&mut self) -> io::Result<()> {
        let mut last_error = None;
        for attempt in 1..=MAX_RECREATE_ATTEMPTS {
            if self.stopped() {
                return Ok(());
            }
            match self.acceptor.recreate() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Re-creating command channel failed (attempt {}): {}", attempt, e);
                    last_error = Some(e);
                    thread::sleep(RECREATE_BACKOFF * attempt);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| io::Error::other("command channel re-creation failed")))
    }
}

/// Read the single line a client sends, without its terminator.
///
/// `Ok(None)` means the client sent nothing but whitespace.
fn read_message<R: Read>(conn: R) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(conn.take(MAX_LINE_BYTES + 1));
    let mut line = String::new();
    reader.read_line(&mut line)?;

    if line.len() as u64 > MAX_LINE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("command line longer than {} bytes", MAX_LINE_BYTES),
        ));
    }

    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}
