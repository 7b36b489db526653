use std::io::Write;

use crate::junit::formatter::ResultFormatter;
use crate::junit::formatters::{counts_line, missing_output};
use crate::junit::result::SuiteReport;

/// One `Running` line and one totals line per suite
#[derive(Default)]
pub struct SummaryFormatter {
    out: Option<Box<dyn Write>>,
    with_output: bool,
    stdout: String,
    stderr: String,
}

impl SummaryFormatter {
    /// `with_output` also prints the suite's captured output
    pub fn new(with_output: bool) -> Self {
        Self {
            with_output,
            ..Self::default()
        }
    }
}

impl ResultFormatter for SummaryFormatter {
    fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = Some(out);
    }

    fn start_test_suite(&mut self, suite: &SuiteReport) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(missing_output)?;
        writeln!(out, "Running {}", suite.name)?;
        Ok(())
    }

    fn end_test_suite(&mut self, suite: &SuiteReport) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(missing_output)?;
        writeln!(out, "{}", counts_line(suite))?;
        if self.with_output {
            if !self.stdout.is_empty() {
                write!(out, "Output:\n{}", self.stdout)?;
            }
            if !self.stderr.is_empty() {
                write!(out, "Error: \n{}", self.stderr)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    fn set_system_output(&mut self, output: &str) -> anyhow::Result<()> {
        self.stdout = output.to_string();
        Ok(())
    }

    fn set_system_error(&mut self, output: &str) -> anyhow::Result<()> {
        self.stderr = output.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::junit::formatter::SharedBuffer;

    #[test]
    fn test_summary_lines() {
        let buffer = SharedBuffer::new();
        let mut formatter = SummaryFormatter::new(true);
        formatter.set_output(Box::new(buffer.clone()));

        let mut suite = SuiteReport::new("checks", Default::default());
        formatter.start_test_suite(&suite).unwrap();
        formatter.set_system_output("printed\n").unwrap();
        suite.counts.runs = 1;
        suite.run_time = Duration::from_secs(2);
        formatter.end_test_suite(&suite).unwrap();

        assert_eq!(
            buffer.text(),
            "Running checks\nTests run: 1, Failures: 0, Errors: 0, Time elapsed: 2 sec\nOutput:\nprinted\n"
        );
    }
}
