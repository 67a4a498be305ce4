/// True when a TXT record on `_dmarc.<domain>` carries the DMARC1 version tag.
pub(crate) fn is_published(records: &[String]) -> bool {
    records
        .iter()
        .any(|record| record.to_ascii_lowercase().contains("v=dmarc1"))
}
