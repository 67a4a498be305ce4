use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use native_tls::TlsConnector;
use tracing::{debug, info, warn};

use crate::dns::DnsResolver;

use super::error::SmtpError;
use super::options::ProbeOptions;
use super::session::{SmtpReply, SmtpSession};
use super::types::{ExchangerOutcome, Rejection, Security, SmtpOutcome, Transport};

/// A mailbox check against one mail exchanger.
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    async fn probe(&self, mx_host: &str, address: &str) -> SmtpOutcome;
}

/// Walks `hosts` in order. The first host giving an answer (accepted,
/// rejected with a code, or deferred) decides; unreachable hosts are skipped.
pub async fn probe_exchangers<P>(prober: &P, hosts: &[String], address: &str) -> ExchangerOutcome
where
    P: MailboxProbe + ?Sized,
{
    for host in hosts {
        let outcome = prober.probe(host, address).await;
        if outcome != SmtpOutcome::Rejected(Rejection::Unreachable) {
            return ExchangerOutcome {
                outcome,
                mx_host: Some(host.clone()),
            };
        }
        debug!(host = %host, "exchanger unreachable, trying next");
    }
    ExchangerOutcome {
        outcome: SmtpOutcome::Rejected(Rejection::Unreachable),
        mx_host: None,
    }
}

/// Live SMTP prober. Exchanger names go through the shared [`DnsResolver`];
/// sessions are blocking sockets run on the blocking pool, bounded by the
/// connect, command and session timeouts.
#[derive(Clone)]
pub struct SmtpProber {
    options: Arc<ProbeOptions>,
    connector: TlsConnector,
    resolver: Arc<DnsResolver>,
}

impl SmtpProber {
    pub fn new(options: ProbeOptions, resolver: Arc<DnsResolver>) -> Result<Self, SmtpError> {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .danger_accept_invalid_hostnames(options.accept_invalid_certs)
            .build()
            .map_err(|source| SmtpError::Tls { source })?;
        Ok(Self {
            options: Arc::new(options),
            connector,
            resolver,
        })
    }

    /// IPv4 addresses for `mx_host`; an address literal is used as is.
    async fn addresses(&self, mx_host: &str) -> Vec<IpAddr> {
        if let Ok(ip) = mx_host.parse::<IpAddr>() {
            return vec![ip];
        }
        self.resolver
            .ipv4(mx_host)
            .await
            .into_iter()
            .map(IpAddr::V4)
            .collect()
    }

    /// Tries every configured transport against `addrs` in order; the first
    /// one that reaches a classified reply decides.
    pub fn probe_blocking(&self, mx_host: &str, addrs: &[IpAddr], address: &str) -> SmtpOutcome {
        for transport in &self.options.transports {
            match self.run_dialogue(mx_host, addrs, *transport, address) {
                Ok(outcome) => {
                    info!(host = mx_host, %transport, %outcome, "mailbox checked");
                    return outcome;
                }
                Err(err) => {
                    debug!(host = mx_host, %transport, error = %err, "transport failed");
                }
            }
        }
        warn!(host = mx_host, "no transport reachable");
        SmtpOutcome::Rejected(Rejection::Unreachable)
    }

    fn run_dialogue(
        &self,
        host: &str,
        addrs: &[IpAddr],
        transport: Transport,
        address: &str,
    ) -> Result<SmtpOutcome, SmtpError> {
        let sockets: Vec<SocketAddr> = addrs
            .iter()
            .map(|ip| SocketAddr::new(*ip, transport.port))
            .collect();
        let mut session = SmtpSession::connect(host, &sockets, &self.options)?;
        if transport.security == Security::Implicit {
            session.start_implicit_tls(&self.connector)?;
        }

        let greeting = session.read_greeting()?;
        if !greeting.is_positive_completion() {
            session.quit();
            return Err(SmtpError::Protocol(format!(
                "greeting refused with {}",
                greeting.code
            )));
        }

        let ehlo_cmd = format!("EHLO {}", self.options.helo_name());
        let ehlo = expect_positive(session.send_command(&ehlo_cmd)?, "EHLO")?;

        if transport.security == Security::StartTls && ehlo.has_capability("STARTTLS") {
            let reply = session.starttls(&self.connector)?;
            if !reply.is_positive_completion() {
                session.quit();
                return Err(SmtpError::Protocol(format!("STARTTLS refused with {}", reply.code)));
            }
            expect_positive(session.send_command(&ehlo_cmd)?, "EHLO")?;
        }

        let mail_reply = session.send_command("MAIL FROM:<>")?;
        if !mail_reply.is_positive_completion() {
            session.quit();
            return Ok(SmtpOutcome::from_code(mail_reply.code));
        }

        let rcpt_reply = session.send_command(&format!("RCPT TO:<{address}>"))?;
        session.quit();
        Ok(SmtpOutcome::from_code(rcpt_reply.code))
    }
}

fn expect_positive(reply: SmtpReply, stage: &str) -> Result<SmtpReply, SmtpError> {
    if reply.is_positive_completion() {
        Ok(reply)
    } else {
        Err(SmtpError::Protocol(format!("{stage} refused with {}", reply.code)))
    }
}

#[async_trait]
impl MailboxProbe for SmtpProber {
    async fn probe(&self, mx_host: &str, address: &str) -> SmtpOutcome {
        let addrs = self.addresses(mx_host).await;
        if addrs.is_empty() {
            debug!(host = mx_host, "exchanger has no address");
            return SmtpOutcome::Rejected(Rejection::Unreachable);
        }
        let prober = self.clone();
        let host = mx_host.to_string();
        let address = address.to_string();
        match tokio::task::spawn_blocking(move || prober.probe_blocking(&host, &addrs, &address))
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(host = mx_host, error = %err, "mailbox check task failed");
                SmtpOutcome::Rejected(Rejection::Unreachable)
            }
        }
    }
}
