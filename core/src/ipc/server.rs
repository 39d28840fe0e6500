use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::info;

use crate::error::{LauncherError, Result};

/// How long a connected client may take to deliver its line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Unblocks a pending `accept` so the listener can observe a stop request.
pub type Wake = Box<dyn Fn() + Send + Sync>;

/// Server side of the command channel, as seen by the listener loop.
pub trait ChannelAcceptor: Send + 'static {
    type Conn: Read + Send;

    /// Block until the next client connects.
    fn accept(&mut self) -> io::Result<Self::Conn>;

    /// Throw away the current endpoint and open a fresh one.
    fn recreate(&mut self) -> io::Result<()>;

    fn waker(&self) -> Wake;
}

/// Loopback TCP endpoint on a fixed port, accepting one client at a time.
pub struct ChannelServer {
    listener: Option<TcpListener>,
    addr: SocketAddr,
}

impl ChannelServer {
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .map_err(|source| LauncherError::ChannelBind { port, source })?;
        let addr = listener.local_addr()?;
        info!("Command channel listening on {}", addr);
        Ok(Self {
            listener: Some(listener),
            addr,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl ChannelAcceptor for ChannelServer {
    type Conn = TcpStream;

    fn accept(&mut self) -> io::Result<TcpStream> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "command channel is closed")
        })?;
        let (stream, _) = listener.accept()?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(stream)
    }

    fn recreate(&mut self) -> io::Result<()> {
        // The old socket must be gone before the fixed port can be bound again.
        self.listener = None;
        self.listener = Some(TcpListener::bind(self.addr)?);
        info!("Command channel re-created on {}", self.addr);
        Ok(())
    }

    fn waker(&self) -> Wake {
        let addr = self.addr;
        Box::new(move || {
            let _ = TcpStream::connect_timeout(&addr, Duration::from_millis(250));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accepts_loopback_client() {
        let mut server = ChannelServer::bind(0).unwrap();
        let port = server.port();

        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
            stream.write_all(b"/settings\n").unwrap();
        });

        let mut conn = server.accept().unwrap();
        let mut received = String::new();
        conn.read_to_string(&mut received).unwrap();
        client.join().unwrap();

        assert_eq!(received, "/settings\n");
    }

    #[test]
    fn test_second_bind_on_same_port_fails() {
        let server = ChannelServer::bind(0).unwrap();
        let result = ChannelServer::bind(server.port());

        assert!(matches!(result, Err(LauncherError::ChannelBind { .. })));
    }
}
