use std::sync::Arc;

use super::*;
use crate::auth::AuthFlags;
use crate::disposable::{DisposableDomainCache, DisposableOptions, StaticListSource};
use crate::dns::tests::{StubUpstream, resolver_with};
use crate::greylist::{RetryPolicy, RetryScheduler};
use crate::smtp::tests::ScriptedProbe;
use crate::smtp::{Rejection, SmtpOutcome};

struct Harness {
    verifier: Verifier,
    upstream: Arc<StubUpstream>,
    probe: Arc<ScriptedProbe>,
    greylist: GreylistStore,
}

async fn harness(stub: StubUpstream, probe: ScriptedProbe) -> Harness {
    let (resolver, upstream) = resolver_with(stub);
    let probe = Arc::new(probe);
    let greylist = GreylistStore::open_in_memory().await.unwrap();
    let disposable = Arc::new(DisposableDomainCache::with_sources(
        vec![Box::new(StaticListSource::new(["tempmail.example"]))],
        DisposableOptions {
            list_urls: Vec::new(),
            ..DisposableOptions::default()
        },
    ));
    let verifier = Verifier::new(
        resolver,
        probe.clone(),
        greylist.clone(),
        disposable,
        &Config::default(),
    );
    Harness {
        verifier,
        upstream,
        probe,
        greylist,
    }
}

#[tokio::test]
async fn accepted_mailbox_is_valid() {
    let h = harness(
        StubUpstream::new().mx("example.com", &[(10, "mx1.example.com")]),
        ScriptedProbe::new().on("mx1.example.com", &[SmtpOutcome::Accepted]),
    )
    .await;

    let result = h.verifier.verify("User@Example.com").await;
    assert_eq!(result.verdict, Verdict::Valid);
    assert!(result.syntax_valid);
    assert!(result.mx_found);
    assert_eq!(result.smtp, Some(SmtpOutcome::Accepted));
    assert_eq!(result.mx_host.as_deref(), Some("mx1.example.com"));
    assert_eq!(result.address, "User@Example.com");
    assert!(!result.disposable);
    assert_eq!(
        h.probe.calls(),
        vec![("mx1.example.com".to_string(), "User@example.com".to_string())]
    );
    assert_eq!(h.verifier.greylist_count().await.unwrap(), 0);
}

#[tokio::test]
async fn accepted_disposable_mailbox_is_risky() {
    let h = harness(
        StubUpstream::new().mx("tempmail.example", &[(10, "mx.tempmail.example")]),
        ScriptedProbe::new().on("mx.tempmail.example", &[SmtpOutcome::Accepted]),
    )
    .await;

    let result = h.verifier.verify("someone@tempmail.example").await;
    assert!(result.disposable);
    assert_eq!(result.verdict, Verdict::Risky);
}

#[tokio::test]
async fn invalid_syntax_touches_no_network() {
    let h = harness(StubUpstream::new(), ScriptedProbe::new()).await;

    let result = h.verifier.verify("not-an-email").await;
    assert_eq!(result.verdict, Verdict::Invalid);
    assert!(!result.syntax_valid);
    assert_eq!(result.smtp, None);
    assert_eq!(h.upstream.calls(), 0);
    assert!(h.probe.calls().is_empty());
}

#[tokio::test]
async fn domain_without_mail_records_is_not_probed() {
    let h = harness(StubUpstream::new(), ScriptedProbe::new()).await;

    let result = h.verifier.verify("user@nowhere.example").await;
    assert_eq!(result.verdict, Verdict::Invalid);
    assert!(!result.mx_found);
    assert_eq!(result.smtp, None);
    assert!(h.probe.calls().is_empty());
}

#[tokio::test]
async fn a_record_stands_in_for_missing_mx() {
    let h = harness(
        StubUpstream::new().a("example.org", &[[192, 0, 2, 7]]),
        ScriptedProbe::new().on("example.org", &[SmtpOutcome::Accepted]),
    )
    .await;

    let result = h.verifier.verify("user@example.org").await;
    assert!(result.mx_found);
    assert_eq!(result.mx_host.as_deref(), Some("example.org"));
    assert_eq!(result.verdict, Verdict::Valid);
}

#[tokio::test]
async fn unknown_user_is_invalid() {
    let h = harness(
        StubUpstream::new().mx("example.com", &[(10, "mx1.example.com")]),
        ScriptedProbe::new().on("mx1.example.com", &[SmtpOutcome::Rejected(Rejection::Code(550))]),
    )
    .await;

    let result = h.verifier.verify("ghost@example.com").await;
    assert_eq!(result.smtp, Some(SmtpOutcome::Rejected(Rejection::Code(550))));
    assert_eq!(result.verdict, Verdict::Invalid);
}

#[tokio::test]
async fn unreachable_exchangers_are_invalid() {
    let h = harness(
        StubUpstream::new().mx("example.com", &[(10, "mx1.example.com"), (20, "mx2.example.com")]),
        ScriptedProbe::new(),
    )
    .await;

    let result = h.verifier.verify("user@example.com").await;
    assert_eq!(result.smtp, Some(SmtpOutcome::Rejected(Rejection::Unreachable)));
    assert_eq!(result.mx_host, None);
    assert_eq!(result.verdict, Verdict::Invalid);
    assert_eq!(h.probe.calls().len(), 2);
}

#[tokio::test]
async fn deferred_mailbox_is_greylisted_then_resolved() {
    let h = harness(
        StubUpstream::new().mx("example.com", &[(10, "mx1.example.com")]),
        ScriptedProbe::new().on(
            "mx1.example.com",
            &[SmtpOutcome::TemporaryFailure { code: 450 }, SmtpOutcome::Accepted],
        ),
    )
    .await;

    let result = h.verifier.verify("user@example.com").await;
    assert_eq!(result.verdict, Verdict::Greylisted);
    assert_eq!(h.verifier.greylist_count().await.unwrap(), 1);

    let record = h.greylist.get("user@example.com").await.unwrap().unwrap();
    assert_eq!(record.mx_host, "mx1.example.com");
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.next_attempt - record.last_attempt, 600);

    let scheduler = RetryScheduler::new(h.greylist.clone(), h.probe.clone(), RetryPolicy::default());
    let summary = scheduler.run_pass_at(record.next_attempt).await;
    assert_eq!(summary.resolved, 1);
    assert_eq!(h.verifier.greylist_count().await.unwrap(), 0);
}

#[tokio::test]
async fn deferral_without_queue_is_unknown() {
    let h = harness(
        StubUpstream::new().mx("example.com", &[(10, "mx1.example.com")]),
        ScriptedProbe::new().on("mx1.example.com", &[SmtpOutcome::TemporaryFailure { code: 451 }]),
    )
    .await;
    h.greylist.close().await;

    let result = h.verifier.verify("user@example.com").await;
    assert_eq!(result.smtp, Some(SmtpOutcome::TemporaryFailure { code: 451 }));
    assert_eq!(result.verdict, Verdict::Unknown);
}

#[tokio::test]
async fn informational_checks_are_reported() {
    let h = harness(
        StubUpstream::new()
            .mx("example.com", &[(10, "mx1.example.com")])
            .a("mx1.example.com", &[[192, 0, 2, 10]])
            .a("10.2.0.192.bl.spamcop.net", &[[127, 0, 0, 2]])
            .txt("example.com", &["v=spf1 include:_spf.example.com -all"])
            .txt("_dmarc.example.com", &["v=DMARC1; p=reject"]),
        ScriptedProbe::new().on("mx1.example.com", &[SmtpOutcome::Accepted]),
    )
    .await;

    let result = h.verifier.verify("user@example.com").await;
    assert_eq!(
        result.auth,
        AuthFlags {
            spf: true,
            dkim: false,
            dmarc: true,
        }
    );
    assert!(result.reputation_listed);
    // Informational only.
    assert_eq!(result.verdict, Verdict::Valid);
}

/// Exchanger that accepts the connection and then never answers.
struct StalledExchanger;

#[async_trait::async_trait]
impl MailboxProbe for StalledExchanger {
    async fn probe(&self, _mx_host: &str, _address: &str) -> SmtpOutcome {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        SmtpOutcome::Accepted
    }
}

#[tokio::test]
async fn stalled_exchanger_is_cut_off_at_the_deadline() {
    let (resolver, _) =
        resolver_with(StubUpstream::new().mx("example.com", &[(10, "mx1.example.com")]));
    let config = Config {
        verify: VerifyOptions {
            probe_deadline: std::time::Duration::from_millis(200),
            ..VerifyOptions::default()
        },
        ..Config::default()
    };
    let disposable = Arc::new(DisposableDomainCache::with_sources(
        Vec::new(),
        DisposableOptions {
            list_urls: Vec::new(),
            ..DisposableOptions::default()
        },
    ));
    let greylist = GreylistStore::open_in_memory().await.unwrap();
    let verifier = Verifier::new(
        resolver,
        Arc::new(StalledExchanger),
        greylist.clone(),
        disposable,
        &config,
    );

    let started = std::time::Instant::now();
    let result = verifier.verify("user@example.com").await;
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert!(result.mx_found);
    assert_eq!(result.smtp, Some(SmtpOutcome::Rejected(Rejection::Unreachable)));
    assert_eq!(result.mx_host, None);
    assert_eq!(result.verdict, Verdict::Invalid);
    assert_eq!(greylist.count().await.unwrap(), 0);
}
