//! DKIM presence is a heuristic. Selectors are arbitrary labels chosen by the
//! domain operator and cannot be enumerated, so only a fixed list of common
//! ones is probed; a miss does not mean the domain lacks DKIM.

pub(crate) fn selector_name(selector: &str, domain: &str) -> String {
    super::fqdn(&format!("{selector}._domainkey"), domain)
}

pub(crate) fn is_key_record(records: &[String]) -> bool {
    records
        .iter()
        .any(|record| record.to_ascii_lowercase().contains("v=dkim1"))
}
