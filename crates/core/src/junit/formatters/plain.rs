use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

use crate::junit::formatter::{format_seconds, ResultFormatter};
use crate::junit::formatters::{counts_line, missing_output, write_output_sections};
use crate::junit::result::SuiteReport;

/// Line per case with its time, plus details of failures and errors
#[derive(Default)]
pub struct PlainFormatter {
    out: Option<Box<dyn Write>>,
    cases: String,
    pending: Vec<String>,
    stdout: String,
    stderr: String,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultFormatter for PlainFormatter {
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
        for line in self.pending.drain(..) {
            write!(self.cases, "{}", line)?;
        }
        write_output_sections(out.as_mut(), &self.stdout, &self.stderr)?;
        writeln!(out)?;
        write!(out, "{}", self.cases)?;
        out.flush()?;
        Ok(())
    }

    fn end_test(&mut self, test: &str, duration: Duration) -> anyhow::Result<()> {
        writeln!(self.cases, "Testcase: {} took {} sec", test, format_seconds(duration))?;
        for line in self.pending.drain(..) {
            self.cases.push_str(&line);
        }
        Ok(())
    }

    fn add_failure(&mut self, _test: &str, message: &str) -> anyhow::Result<()> {
        self.pending.push(format!("\tFAILED\n{}\n", message));
        Ok(())
    }

    fn add_error(&mut self, test: Option<&str>, message: &str) -> anyhow::Result<()> {
        let entry = format!("\tCaused an ERROR\n{}\n", message);
        match test {
            Some(_) => self.pending.push(entry),
            None => {
                self.cases.push_str("Caused an ERROR\n");
                writeln!(self.cases, "{}", message)?;
            }
        }
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
    use super::*;
    use crate::junit::formatter::SharedBuffer;
    use crate::junit::result::TestCounts;

    #[test]
    fn test_plain_report() {
        let buffer = SharedBuffer::new();
        let mut formatter = PlainFormatter::new();
        formatter.set_output(Box::new(buffer.clone()));

        let mut suite = SuiteReport::new("suites.smoke", Default::default());
        formatter.start_test_suite(&suite).unwrap();
        formatter.start_test("ok").unwrap();
        formatter.end_test("ok", Duration::from_millis(10)).unwrap();
        formatter.start_test("bad").unwrap();
        formatter.add_failure("bad", "expected 1").unwrap();
        formatter.end_test("bad", Duration::from_millis(20)).unwrap();
        formatter.set_system_output("hello\n").unwrap();
        suite.counts = TestCounts {
            runs: 2,
            failures: 1,
            errors: 0,
        };
        suite.run_time = Duration::from_millis(30);
        formatter.end_test_suite(&suite).unwrap();

        assert_eq!(
            buffer.text(),
            "Testsuite: suites.smoke\n\
             Tests run: 2, Failures: 1, Errors: 0, Time elapsed: 0.03 sec\n\
             ------------- Standard Output ---------------\n\
             hello\n\
             ------------- ---------------- ---------------\n\
             \n\
             Testcase: ok took 0.01 sec\n\
             Testcase: bad took 0.02 sec\n\
             \tFAILED\n\
             expected 1\n"
        );
    }
}
