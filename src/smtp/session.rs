use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use native_tls::{HandshakeError, TlsConnector, TlsStream};
use tracing::debug;

use super::error::SmtpError;
use super::options::ProbeOptions;

/// Longest reply line accepted before the server is treated as broken.
const MAX_LINE_LEN: usize = 4096;
/// Most lines accepted in one multi-line reply.
const MAX_REPLY_LINES: usize = 128;

#[derive(Debug, Clone)]
pub(crate) struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .map(|token| token.eq_ignore_ascii_case(cap))
                .unwrap_or(false)
        })
    }
}

enum StreamState {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
    Invalid,
}

struct SmtpStream {
    state: StreamState,
    buffer: Vec<u8>,
    command_timeout: Duration,
    /// Hard stop for the whole conversation; no read or write outlives it.
    session_deadline: Instant,
}

impl SmtpStream {
    fn connect(
        addr: &SocketAddr,
        connect_timeout: Duration,
        command_timeout: Duration,
        session_deadline: Instant,
    ) -> Result<Self, SmtpError> {
        let remaining = session_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SmtpError::Timeout);
        }
        let stream = TcpStream::connect_timeout(addr, connect_timeout.min(remaining))
            .map_err(SmtpError::io)?;
        Ok(Self {
            state: StreamState::Plain(stream),
            buffer: Vec::new(),
            command_timeout,
            session_deadline,
        })
    }

    /// Deadline for the next command or reply: the command timeout, clipped
    /// to whatever is left of the session.
    fn step_deadline(&self) -> Instant {
        (Instant::now() + self.command_timeout).min(self.session_deadline)
    }

    /// Points the socket timeouts at `deadline`, failing once it has passed.
    fn arm(&self, deadline: Instant) -> Result<(), SmtpError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SmtpError::Timeout);
        }
        let socket = match &self.state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => stream.get_ref(),
            StreamState::Invalid => {
                return Err(SmtpError::Protocol("invalid stream state".into()));
            }
        };
        socket
            .set_read_timeout(Some(remaining))
            .and_then(|_| socket.set_write_timeout(Some(remaining)))
            .map_err(SmtpError::io)
    }

    fn upgrade_tls(&mut self, host: &str, connector: &TlsConnector) -> Result<(), SmtpError> {
        if matches!(self.state, StreamState::Tls(_)) {
            return Ok(());
        }
        let deadline = self.step_deadline();
        self.arm(deadline)?;
        let plain = match std::mem::replace(&mut self.state, StreamState::Invalid) {
            StreamState::Plain(stream) => stream,
            _ => return Err(SmtpError::Protocol("invalid stream state".into())),
        };
        // Bytes buffered before the handshake belong to the plaintext session.
        self.buffer.clear();
        self.state = StreamState::Tls(complete_handshake(connector, host, plain, deadline)?);
        Ok(())
    }

    fn send_line(&mut self, command: &str) -> Result<(), SmtpError> {
        self.arm(self.step_deadline())?;
        let mut data = command.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        let result = match &mut self.state {
            StreamState::Plain(stream) => stream.write_all(&data).and_then(|_| stream.flush()),
            StreamState::Tls(stream) => stream.write_all(&data).and_then(|_| stream.flush()),
            StreamState::Invalid => {
                return Err(SmtpError::Protocol("invalid stream state".into()));
            }
        };
        result.map_err(SmtpError::io)
    }

    fn read_reply(&mut self) -> Result<SmtpReply, SmtpError> {
        let deadline = self.step_deadline();
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            if lines.len() == MAX_REPLY_LINES {
                return Err(SmtpError::Protocol(format!(
                    "reply exceeds {MAX_REPLY_LINES} lines"
                )));
            }
            let line = self.read_line(deadline)?;
            if line.len() < 3 {
                return Err(SmtpError::Protocol(format!("invalid reply: {line}")));
            }
            let parsed_code = line
                .get(..3)
                .and_then(|digits| digits.parse::<u16>().ok())
                .ok_or_else(|| SmtpError::Protocol(format!("invalid code in line: {line}")))?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(SmtpError::Protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if is_last {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }

    fn read_line(&mut self, deadline: Instant) -> Result<String, SmtpError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();
                if line.ends_with(b"\r\n") {
                    line.truncate(line.len() - 2);
                } else {
                    line.truncate(line.len() - 1);
                }
                return String::from_utf8(line)
                    .map_err(|err| SmtpError::Protocol(format!("utf8 error: {err}")));
            }

            if self.buffer.len() > MAX_LINE_LEN {
                return Err(SmtpError::Protocol(format!(
                    "reply line exceeds {MAX_LINE_LEN} bytes"
                )));
            }

            self.arm(deadline)?;
            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf),
                StreamState::Tls(stream) => stream.read(&mut buf),
                StreamState::Invalid => {
                    return Err(SmtpError::Protocol("invalid stream state".into()));
                }
            };
            let read = read.map_err(|err| match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SmtpError::Timeout,
                _ => SmtpError::io(err),
            })?;
            if read == 0 {
                return Err(SmtpError::io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            self.buffer.extend_from_slice(&buf[..read]);
        }
    }
}

fn complete_handshake(
    connector: &TlsConnector,
    host: &str,
    stream: TcpStream,
    deadline: Instant,
) -> Result<TlsStream<TcpStream>, SmtpError> {
    let failure = |message: String| SmtpError::Handshake {
        host: host.to_string(),
        message,
    };
    match connector.connect(host, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(failure(err.to_string())),
        Err(HandshakeError::WouldBlock(mut mid)) => loop {
            match mid.handshake() {
                Ok(tls) => break Ok(tls),
                Err(HandshakeError::Failure(err)) => break Err(failure(err.to_string())),
                // A socket timeout surfaces as WouldBlock; stop at the deadline.
                Err(HandshakeError::WouldBlock(_)) if Instant::now() >= deadline => {
                    break Err(SmtpError::Timeout);
                }
                Err(HandshakeError::WouldBlock(next)) => mid = next,
            }
        },
    }
}

/// One blocking SMTP conversation with a single host and port.
pub(crate) struct SmtpSession {
    host: String,
    stream: SmtpStream,
}

impl SmtpSession {
    /// Tries `addresses` in order until one accepts the TCP connection. The
    /// session deadline starts ticking here and covers every later step.
    pub fn connect(
        host: &str,
        addresses: &[SocketAddr],
        options: &ProbeOptions,
    ) -> Result<Self, SmtpError> {
        let session_deadline = Instant::now() + options.session_timeout;
        let mut last_err = None;
        for addr in addresses {
            match SmtpStream::connect(
                addr,
                options.connect_timeout,
                options.command_timeout,
                session_deadline,
            ) {
                Ok(stream) => {
                    return Ok(Self {
                        host: host.to_string(),
                        stream,
                    });
                }
                Err(SmtpError::Io { source }) => {
                    last_err = Some(SmtpError::Connect {
                        host: format!("{host} ({addr})"),
                        source,
                    })
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| SmtpError::NoAddress {
            host: host.to_string(),
        }))
    }

    pub fn start_implicit_tls(&mut self, connector: &TlsConnector) -> Result<(), SmtpError> {
        let host = self.host.clone();
        self.stream.upgrade_tls(&host, connector)
    }

    pub fn read_greeting(&mut self) -> Result<SmtpReply, SmtpError> {
        let reply = self.stream.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    pub fn send_command(&mut self, command: &str) -> Result<SmtpReply, SmtpError> {
        debug!(host = %self.host, "C: {command}");
        self.stream.send_line(command)?;
        let reply = self.stream.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Issues STARTTLS and upgrades the stream on a positive reply.
    pub fn starttls(&mut self, connector: &TlsConnector) -> Result<SmtpReply, SmtpError> {
        let reply = self.send_command("STARTTLS")?;
        if !reply.is_positive_completion() {
            return Ok(reply);
        }
        let host = self.host.clone();
        self.stream.upgrade_tls(&host, connector)?;
        Ok(reply)
    }

    pub fn quit(&mut self) {
        if let Err(err) = self.send_command("QUIT") {
            debug!(host = %self.host, error = %err, "QUIT failed");
        }
    }

    fn record_reply(&self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            debug!(host = %self.host, "S: {}", reply.code);
        } else {
            for line in &reply.lines {
                debug!(host = %self.host, "S: {} {}", reply.code, line);
            }
        }
    }
}
