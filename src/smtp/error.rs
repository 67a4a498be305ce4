use thiserror::Error;

/// Failures inside one SMTP session. They never leave the prober: a session
/// error moves on to the next transport, then to the next exchanger.
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("no address resolved for {host}")]
    NoAddress { host: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS setup failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("TLS handshake with {host} failed: {message}")]
    Handshake { host: String, message: String },
    #[error("session timed out")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SmtpError {
    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}
