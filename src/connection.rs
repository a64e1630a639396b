use std::fmt;
use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use crate::proto::ProtoError;
use crate::proto::codec::{self, Sample};
use crate::proto::command::{Command, RESPONSE_OK, format_command};

pub const CONTROL_PORT: u16 = 3893;
pub const DATA_PORT: u16 = 3894;

/// Which of the two instrument endpoints a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Control,
    Data,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Control => "control",
            Role::Data => "data",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `attempt` until it succeeds or the policy is exhausted, sleeping
/// between failures (never after the last one).
pub fn retry_connect<T>(
    role: Role,
    addr: &str,
    policy: &RetryPolicy,
    mut attempt: impl FnMut() -> std::io::Result<T>,
) -> Result<T, ProtoError> {
    let attempts = policy.max_attempts.max(1);
    for n in 1..=attempts {
        match attempt() {
            Ok(v) => {
                info!("[conn] {} connected to {} (attempt {}/{})", role, addr, n, attempts);
                return Ok(v);
            }
            Err(e) => {
                warn!("[conn] {} {}: attempt {}/{} failed: {}", role, addr, n, attempts, e);
                if n < attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(ProtoError::FatalConnect {
        role,
        addr: addr.to_string(),
        attempts,
    })
}

/// One TCP connection to the instrument with blocking line and block reads.
#[derive(Debug)]
pub struct SessionConnection {
    role: Role,
    peer: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    closed: bool,
}

impl SessionConnection {
    pub fn connect(
        role: Role,
        host: &str,
        port: u16,
        policy: &RetryPolicy,
    ) -> Result<Self, ProtoError> {
        let addr = format!("{}:{}", host, port);
        let stream = retry_connect(role, &addr, policy, || TcpStream::connect(&addr))?;
        Self::from_stream(role, stream)
    }

    pub fn from_stream(role: Role, stream: TcpStream) -> Result<Self, ProtoError> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        let writer = stream.try_clone()?;
        Ok(Self {
            role,
            peer,
            reader: BufReader::new(stream),
            writer,
            closed: false,
        })
    }

    pub fn send(&mut self, cmd: &Command) -> Result<(), ProtoError> {
        if self.closed {
            return Err(ProtoError::ConnectionClosed);
        }
        debug!("[conn] {} >> {:?}", self.role, cmd.lines());
        // write_all loops over partial writes
        self.writer
            .write_all(format_command(cmd).as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected => {
                    ProtoError::ConnectionClosed
                }
                _ => ProtoError::Io(e),
            })
    }

    pub fn read_line(&mut self) -> Result<String, ProtoError> {
        let line = codec::read_line(&mut self.reader)?;
        debug!("[conn] {} << {:?}", self.role, line);
        Ok(line)
    }

    pub fn read_int(&mut self, exchange: &'static str) -> Result<i64, ProtoError> {
        let n = codec::read_int_line(&mut self.reader, exchange)?;
        debug!("[conn] {} << {} ({})", self.role, n, exchange);
        Ok(n)
    }

    pub fn read_block<T: Sample>(&mut self, byte_count: usize) -> Result<Vec<T>, ProtoError> {
        let block = codec::read_block(&mut self.reader, byte_count)?;
        debug!("[conn] {} << {} byte block", self.role, byte_count);
        Ok(block)
    }

    /// Read one line and require `token` to appear somewhere in it.
    pub fn expect(&mut self, exchange: &'static str, token: &str) -> Result<String, ProtoError> {
        let line = self.read_line()?;
        if !line.contains(token) {
            return Err(ProtoError::UnexpectedReply {
                exchange,
                expected: token.to_string(),
                got: line,
            });
        }
        Ok(line)
    }

    /// Read a status reply; anything but the success token is an error.
    pub fn expect_ok(&mut self, exchange: &'static str) -> Result<(), ProtoError> {
        let line = self.read_line()?;
        if line.trim() != RESPONSE_OK {
            return Err(ProtoError::UnexpectedReply {
                exchange,
                expected: RESPONSE_OK.to_string(),
                got: line,
            });
        }
        Ok(())
    }

    /// Handle that can shut this socket down from another thread.
    pub fn closer(&self) -> Result<Closer, ProtoError> {
        Ok(Closer {
            role: self.role,
            stream: self.writer.try_clone()?,
        })
    }

    /// Idempotent; unblocks any pending read with `ConnectionClosed`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.writer.shutdown(Shutdown::Both)
            && e.kind() != ErrorKind::NotConnected
        {
            warn!("[conn] {} {}: shutdown: {}", self.role, self.peer, e);
        }
        info!("[conn] {} {} closed", self.role, self.peer);
    }
}

#[derive(Debug)]
pub struct Closer {
    role: Role,
    stream: TcpStream,
}

impl Closer {
    pub fn close(&self) {
        debug!("[conn] {} shut down from another flow", self.role);
        if let Err(e) = self.stream.shutdown(Shutdown::Both)
            && e.kind() != ErrorKind::NotConnected
        {
            warn!("[conn] {} shutdown from another flow: {}", self.role, e);
        }
    }
}
