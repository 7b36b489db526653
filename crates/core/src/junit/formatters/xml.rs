use std::io::Write;
use std::time::Duration;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::junit::formatter::{format_seconds, ResultFormatter};
use crate::junit::formatters::missing_output;
use crate::junit::result::SuiteReport;

#[derive(Debug, Clone)]
enum Problem {
    Failure(String),
    Error(String),
}

#[derive(Debug, Clone)]
struct CaseRecord {
    name: String,
    time: Duration,
    problem: Option<Problem>,
}

/// JUnit-style XML report, written in one piece when the suite ends
#[derive(Default)]
pub struct XmlFormatter {
    out: Option<Box<dyn Write>>,
    cases: Vec<CaseRecord>,
    suite_errors: Vec<String>,
    stdout: String,
    stderr: String,
}

impl XmlFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn case_mut(&mut self, test: &str) -> &mut CaseRecord {
        let index = match self.cases.iter().rposition(|c| c.name == test) {
            Some(index) => index,
            None => {
                self.cases.push(CaseRecord {
                    name: test.to_string(),
                    time: Duration::ZERO,
                    problem: None,
                });
                self.cases.len() - 1
            }
        };
        &mut self.cases[index]
    }

    fn render(&self, suite: &SuiteReport) -> quick_xml::Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("testsuite");
        root.push_attribute(("errors", suite.counts.errors.to_string().as_str()));
        root.push_attribute(("failures", suite.counts.failures.to_string().as_str()));
        root.push_attribute(("name", legal(&suite.name).as_str()));
        root.push_attribute(("tests", suite.counts.runs.to_string().as_str()));
        root.push_attribute(("time", format_seconds(suite.run_time).as_str()));
        writer.write_event(Event::Start(root))?;

        writer.write_event(Event::Start(BytesStart::new("properties")))?;
        for (name, value) in &suite.properties {
            let mut property = BytesStart::new("property");
            property.push_attribute(("name", legal(name).as_str()));
            property.push_attribute(("value", legal(value).as_str()));
            writer.write_event(Event::Empty(property))?;
        }
        writer.write_event(Event::End(BytesEnd::new("properties")))?;

        for case in &self.cases {
            let mut testcase = BytesStart::new("testcase");
            testcase.push_attribute(("classname", legal(&suite.name).as_str()));
            testcase.push_attribute(("name", legal(&case.name).as_str()));
            testcase.push_attribute(("time", format_seconds(case.time).as_str()));
            match &case.problem {
                None => writer.write_event(Event::Empty(testcase))?,
                Some(problem) => {
                    writer.write_event(Event::Start(testcase))?;
                    match problem {
                        Problem::Failure(message) => write_problem(&mut writer, "failure", message)?,
                        Problem::Error(message) => write_problem(&mut writer, "error", message)?,
                    }
                    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
                }
            }
        }
        for message in &self.suite_errors {
            write_problem(&mut writer, "error", message)?;
        }

        write_output(&mut writer, "system-out", &self.stdout)?;
        write_output(&mut writer, "system-err", &self.stderr)?;
        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;

        let mut xml = writer.into_inner();
        xml.push(b'\n');
        Ok(xml)
    }
}

impl ResultFormatter for XmlFormatter {
    fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = Some(out);
    }

    fn end_test_suite(&mut self, suite: &SuiteReport) -> anyhow::Result<()> {
        let xml = self.render(suite)?;
        let out = self.out.as_mut().ok_or_else(missing_output)?;
        out.write_all(&xml)?;
        out.flush()?;
        Ok(())
    }

    fn start_test(&mut self, test: &str) -> anyhow::Result<()> {
        self.case_mut(test);
        Ok(())
    }

    fn end_test(&mut self, test: &str, duration: Duration) -> anyhow::Result<()> {
        self.case_mut(test).time = duration;
        Ok(())
    }

    fn add_failure(&mut self, test: &str, message: &str) -> anyhow::Result<()> {
        self.case_mut(test).problem = Some(Problem::Failure(message.to_string()));
        Ok(())
    }

    fn add_error(&mut self, test: Option<&str>, message: &str) -> anyhow::Result<()> {
        match test {
            Some(test) => self.case_mut(test).problem = Some(Problem::Error(message.to_string())),
            None => self.suite_errors.push(message.to_string()),
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

fn write_problem<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    message: &str,
) -> quick_xml::Result<()> {
    let message = legal(message);
    let first_line = message.lines().next().unwrap_or_default();
    let mut element = BytesStart::new(tag);
    element.push_attribute(("message", first_line));
    element.push_attribute(("type", tag));
    writer.write_event(Event::Start(element))?;
    writer.write_event(Event::Text(BytesText::new(&message)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_output<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    output: &str,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for section in cdata_sections(&legal(output)) {
        writer.write_event(Event::CData(BytesCData::new(section)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Drop characters XML 1.0 cannot carry, even as character references.
fn legal(text: &str) -> String {
    text.chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{fffe}' | '\u{ffff}' => false,
            c => c >= ' ',
        })
        .collect()
}

// A literal "]]>" cannot appear inside one CDATA section; split it across two.
fn cdata_sections(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let mut section = String::new();
            if index > 0 {
                section.push('>');
            }
            section.push_str(part);
            if index < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}
