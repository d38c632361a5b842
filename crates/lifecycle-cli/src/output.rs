//! Report formatting.

use crate::harness::RunReport;
use crate::OutputFormat;
use anyhow::Result;

/// Print a run report to stdout.
pub fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Driver Lifecycle Run");
            println!("====================");
            println!("Name:              {}", report.name);
            println!("Init time:         {} ms", report.init_ms);
            println!("Hold time:         {} ms", report.hold_ms);
            println!("Shutdown attempts: {}", report.shutdown_attempts);
            println!("Drain time:        {} ms", report.drain_ms);
            if let Some(e) = &report.last_error {
                println!("Last error:        {}", e);
            }
            println!();
            if report.drained {
                println!("Status: PASS - driver drained");
            } else {
                println!("Status: FAIL - driver still pending");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }

    Ok(())
}
