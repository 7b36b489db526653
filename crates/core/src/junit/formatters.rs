//! Built-in result formatters

pub mod brief;
pub mod plain;
pub mod summary;
pub mod xml;

pub use brief::BriefFormatter;
pub use plain::PlainFormatter;
pub use summary::SummaryFormatter;
pub use xml::XmlFormatter;

use std::io::{self, Write};

use crate::junit::formatter::format_seconds;
use crate::junit::result::SuiteReport;

fn counts_line(suite: &SuiteReport) -> String {
    format!(
        "Tests run: {}, Failures: {}, Errors: {}, Time elapsed: {} sec",
        suite.counts.runs,
        suite.counts.failures,
        suite.counts.errors,
        format_seconds(suite.run_time)
    )
}

// The captured output sections shared by the plain and brief formats
fn write_output_sections(out: &mut dyn Write, stdout: &str, stderr: &str) -> io::Result<()> {
    if !stdout.is_empty() {
        writeln!(out, "------------- Standard Output ---------------")?;
        write!(out, "{}", stdout)?;
        writeln!(out, "------------- ---------------- ---------------")?;
    }
    if !stderr.is_empty() {
        writeln!(out, "------------- Standard Error -----------------")?;
        write!(out, "{}", stderr)?;
        writeln!(out, "------------- ---------------- ---------------")?;
    }
    Ok(())
}

fn missing_output() -> anyhow::Error {
    anyhow::anyhow!("formatter output was not set")
}
