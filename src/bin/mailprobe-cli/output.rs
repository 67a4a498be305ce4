use std::path::Path;

use anyhow::{Context, Result};
#[cfg(not(feature = "with-serde"))]
use anyhow::bail;
use mailprobe::{GreylistRecord, VerificationResult, Verdict};

use crate::args::OutputFormat;

pub fn write_reports(rows: &[VerificationResult], format: OutputFormat, out: Option<&Path>) -> Result<()> {
    match format {
        OutputFormat::Human => write_human(rows, out),
        OutputFormat::Json => write_json(rows, out),
        OutputFormat::Ndjson => write_ndjson(rows, out),
    }
}

pub fn any_invalid(rows: &[VerificationResult]) -> bool {
    rows.iter().any(|row| row.verdict == Verdict::Invalid)
}

fn write_human(rows: &[VerificationResult], out: Option<&Path>) -> Result<()> {
    let text: String = rows.iter().map(human_line).collect();
    match out {
        Some(path) => write_all_atomically(path, text.as_bytes()),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn human_line(row: &VerificationResult) -> String {
    let tag = format!("[{}]", row.verdict.to_string().to_uppercase());
    if !row.syntax_valid {
        return format!("{tag:<13} {} :: syntax\n", row.address);
    }
    let smtp = row
        .smtp
        .map(|outcome| outcome.to_string())
        .unwrap_or_else(|| "not probed".to_string());
    format!(
        "{tag:<13} {} :: mx={} smtp={} disposable={} spf={} dkim={} dmarc={} dnsbl={}\n",
        row.address,
        row.mx_host.as_deref().unwrap_or("-"),
        smtp,
        yes_no(row.disposable),
        yes_no(row.auth.spf),
        yes_no(row.auth.dkim),
        yes_no(row.auth.dmarc),
        if row.reputation_listed { "listed" } else { "clean" },
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

#[cfg(feature = "with-serde")]
fn write_json(rows: &[VerificationResult], out: Option<&Path>) -> Result<()> {
    let s = serde_json::to_string_pretty(rows)?;
    match out {
        Some(path) => write_all_atomically(path, s.as_bytes()),
        None => {
            println!("{s}");
            Ok(())
        }
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_: &[VerificationResult], _: Option<&Path>) -> Result<()> {
    bail!("--format json requires the 'with-serde' feature")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(rows: &[VerificationResult], out: Option<&Path>) -> Result<()> {
    let mut buf = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut buf, row).context("serialize result")?;
        buf.push(b'\n');
    }
    match out {
        Some(path) => write_all_atomically(path, &buf),
        None => {
            print!("{}", String::from_utf8_lossy(&buf));
            Ok(())
        }
    }
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_: &[VerificationResult], _: Option<&Path>) -> Result<()> {
    bail!("--format ndjson requires the 'with-serde' feature")
}

pub fn print_status(count: u64, due: &[GreylistRecord]) {
    println!("greylisted addresses: {count}");
    for record in due {
        let next = record
            .next_attempt_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| record.next_attempt.to_string());
        println!(
            "  {} via {} (attempt {}, next {})",
            record.address, record.mx_host, record.attempt_count, next
        );
    }
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;

    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("write {}", tmp.display()))?;
        file.sync_all().ok();
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
