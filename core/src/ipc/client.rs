use std::io::{self, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{LauncherError, Result};

/// Forward one raw command line to the running instance.
///
/// Fire-and-forget: the line is written, flushed and the connection closed
/// without waiting for any reply. Line breaks inside `line` are flattened so
/// the message stays a single line on the wire.
///
/// A primary that holds the lock but has not opened the channel yet is
/// waited for until `timeout` runs out.
pub fn send_command(port: u16, line: &str, timeout: Duration) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let mut stream = connect_until(addr, Instant::now() + timeout)
        .map_err(|source| LauncherError::Connect { port, source })?;
    stream.set_write_timeout(Some(timeout))?;

    let payload = single_line(line);
    stream.write_all(payload.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    info!("Forwarded '{}' to running instance on port {}", payload, port);
    Ok(())
}

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(25);

fn connect_until(addr: SocketAddr, deadline: Instant) -> io::Result<TcpStream> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "running instance did not open the command channel in time",
            ));
        }

        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                debug!("Command channel not open yet, retrying");
                thread::sleep(CONNECT_RETRY_DELAY.min(remaining));
            }
            Err(e) => return Err(e),
        }
    }
}

fn single_line(line: &str) -> String {
    line.trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn test_sends_one_terminated_line() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let reader = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).unwrap();
            received
        });

        send_command(port, "/run:abc", Duration::from_secs(1)).unwrap();

        assert_eq!(reader.join().unwrap(), "/run:abc\n");
    }

    #[test]
    fn test_gives_up_at_timeout_without_server() {
        // Grab a free port, then release it so nothing is listening there.
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap().port()
        };

        let started = Instant::now();
        let result = send_command(port, "/settings", Duration::from_secs(1));

        assert!(matches!(result, Err(LauncherError::Connect { .. })));
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_waits_for_channel_opened_late() {
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap().port()
        };

        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).unwrap();
            received
        });

        let started = Instant::now();
        send_command(port, "/settings", Duration::from_secs(1)).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(reader.join().unwrap(), "/settings\n");
    }

    #[test]
    fn test_single_line_flattens_breaks() {
        assert_eq!(single_line("  /run:x\r\nextra \n"), "/run:x  extra");
    }
}
