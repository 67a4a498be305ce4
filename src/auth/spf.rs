/// True when any TXT record on the domain is an SPF record.
pub(crate) fn is_published(records: &[String]) -> bool {
    records
        .iter()
        .any(|record| starts_with_ignore_ascii_case(record.trim(), "v=spf1"))
}

fn starts_with_ignore_ascii_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}
