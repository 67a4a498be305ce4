use super::{AuthChecker, AuthFlags, AuthLookupOptions, DEFAULT_DKIM_SELECTORS, dkim, dmarc, spf};
use crate::dns::tests::{StubUpstream, resolver_with};

fn strings(input: &[&str]) -> Vec<String> {
    input.iter().map(|s| s.to_string()).collect()
}

#[test]
fn spf_requires_version_prefix() {
    assert!(spf::is_published(&strings(&["V=SPF1 include:_spf.example.net ~all"])));
    assert!(!spf::is_published(&strings(&["google-site-verification=abc", "x v=spf1"])));
    assert!(!spf::is_published(&[]));
}

#[test]
fn dmarc_tag_matched_case_insensitively() {
    assert!(dmarc::is_published(&strings(&["v=DMARC1; p=none"])));
    assert!(!dmarc::is_published(&strings(&["v=spf1 -all"])));
}

#[test]
fn dkim_record_detection() {
    assert!(dkim::is_key_record(&strings(&["v=DKIM1; k=rsa; p=MIIB"])));
    assert!(!dkim::is_key_record(&strings(&["k=rsa; p=MIIB"])));
    assert_eq!(
        dkim::selector_name("google", "example.com"),
        "google._domainkey.example.com"
    );
}

#[test]
fn default_selectors_keep_documented_order() {
    let options = AuthLookupOptions::default();
    assert_eq!(options.dkim_selectors(), DEFAULT_DKIM_SELECTORS);
}

#[test]
fn selectors_are_normalised_and_deduplicated() {
    let options = AuthLookupOptions::without_selectors()
        .with_dkim_selectors(["S1.", "s1", " ", "k2"]);
    assert_eq!(options.dkim_selectors(), ["s1", "k2"]);
}

#[tokio::test]
async fn check_auth_combines_findings() {
    let stub = StubUpstream::new()
        .txt("example.com", &["v=spf1 ip4:192.0.2.1 ~all"])
        .txt("_dmarc.example.com", &["v=DMARC1; p=none; rua=mailto:d@example.com"])
        .txt("google._domainkey.example.com", &["v=DKIM1; p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8A"]);
    let (resolver, _) = resolver_with(stub);
    let checker = AuthChecker::new(resolver, AuthLookupOptions::default());

    let flags = checker.check_auth("example.com").await;
    assert_eq!(
        flags,
        AuthFlags {
            spf: true,
            dkim: true,
            dmarc: true
        }
    );
}

#[tokio::test]
async fn dkim_stops_at_first_matching_selector() {
    let stub = StubUpstream::new()
        .txt("selector2._domainkey.example.com", &["v=DKIM1; p=abc"])
        .txt("mail._domainkey.example.com", &["v=DKIM1; p=def"]);
    let (resolver, upstream) = resolver_with(stub);
    let checker = AuthChecker::new(resolver, AuthLookupOptions::default());

    assert!(checker.has_dkim("example.com").await);
    // selector1 then selector2; the remaining four are never queried.
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn unresolvable_domain_reports_all_false() {
    let (resolver, _) = resolver_with(StubUpstream::new());
    let checker = AuthChecker::new(resolver, AuthLookupOptions::default());
    assert_eq!(checker.check_auth("nothing.test").await, AuthFlags::default());
}

#[tokio::test]
async fn dkim_outside_known_selectors_is_missed() {
    let stub = StubUpstream::new().txt("s2048._domainkey.example.com", &["v=DKIM1; p=abc"]);
    let (resolver, _) = resolver_with(stub);
    let checker = AuthChecker::new(resolver, AuthLookupOptions::default());
    assert!(!checker.has_dkim("example.com").await);
}
