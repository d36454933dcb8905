//! Verify command - re-hash store entries

use crate::cache::Digest;
use crate::cli::args::{OutputFormat, VerifyArgs};
use crate::cli::commands::open_store;
use crate::config::Config;
use crate::error::{HoardError, HoardResult};
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// Outcome of verifying one entry
#[derive(Debug, Serialize)]
struct EntryReport {
    digest: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl EntryReport {
    fn ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> HoardResult<()> {
    let store = open_store(config);

    let digests = if args.digests.is_empty() {
        store.entries().await?
    } else {
        args.digests
            .iter()
            .map(|d| Digest::parse(d))
            .collect::<HoardResult<Vec<_>>>()?
    };

    let mut reports = Vec::with_capacity(digests.len());
    for digest in &digests {
        let (status, error) = match store.verify_entry(digest).await {
            Ok(()) => ("ok", None),
            Err(HoardError::DigestMismatch { actual, .. }) => {
                ("corrupt", Some(format!("content hashes to {}", actual)))
            }
            Err(HoardError::NotCached(_)) => ("missing", None),
            Err(e) => ("error", Some(e.to_string())),
        };
        reports.push(EntryReport {
            digest: digest.to_string(),
            status,
            error,
        });
    }

    match args.format {
        OutputFormat::Table => print_table(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Plain => print_plain(&reports),
    }

    let failed = reports.iter().filter(|r| !r.ok()).count();
    if failed > 0 {
        return Err(HoardError::VerifyFailed(failed));
    }
    Ok(())
}

fn print_table(reports: &[EntryReport]) {
    let ctx = UiContext::detect();

    if reports.is_empty() {
        ui::step_info(&ctx, "Store is empty");
        return;
    }

    println!("{:<10} {}", style("STATUS").bold(), style("DIGEST").bold());
    for report in reports {
        let status = match report.status {
            "ok" => style(report.status).green(),
            "missing" => style(report.status).yellow(),
            _ => style(report.status).red(),
        };
        println!("{:<10} {}", status, report.digest);
        if let Some(ref error) = report.error {
            println!("{:<10} {}", "", style(error).dim());
        }
    }

    let ok = reports.iter().filter(|r| r.ok()).count();
    ui::key_value_status(
        &ctx,
        "verified",
        &format!("{}/{}", ok, reports.len()),
        ok == reports.len(),
    );
}

fn print_plain(reports: &[EntryReport]) {
    for report in reports {
        println!("{} {}", report.status, report.digest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_without_empty_error() {
        let report = EntryReport {
            digest: "ab".repeat(32),
            status: "ok",
            error: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(!json.contains("error"));
    }
}
