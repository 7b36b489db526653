use std::fmt::Write as _;
use std::io::Write;

use crate::junit::formatter::ResultFormatter;
use crate::junit::formatters::{counts_line, missing_output, write_output_sections};
use crate::junit::result::SuiteReport;

/// Suite totals plus failing and erroring cases only
#[derive(Default)]
pub struct BriefFormatter {
    out: Option<Box<dyn Write>>,
    problems: String,
    stdout: String,
    stderr: String,
}

impl BriefFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultFormatter for BriefFormatter {
    fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = Some(out);
    }

    fn start_test_suite(&mut self, suite: &SuiteReport) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(missing_output)?;
        writeln!(out, "Testsuite: {}", suite.name)?;
        out.flush()?;
        Ok(())
    }

    fn end_test_suite(&mut self, suite: &SuiteReport) -> anyhow::Result<()> {
        let out = self.out.as_mut().ok_or_else(missing_output)?;
        writeln!(out, "{}", counts_line(suite))?;
        write_output_sections(out.as_mut(), &self.stdout, &self.stderr)?;
        write!(out, "{}", self.problems)?;
        out.flush()?;
        Ok(())
    }

    fn add_failure(&mut self, test: &str, message: &str) -> anyhow::Result<()> {
        writeln!(self.problems, "Testcase: {}:\tFAILED\n{}", test, message)?;
        Ok(())
    }

    fn add_error(&mut self, test: Option<&str>, message: &str) -> anyhow::Result<()> {
        let test = test.unwrap_or("null");
        writeln!(self.problems, "Testcase: {}:\tCaused an ERROR\n{}", test, message)?;
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
