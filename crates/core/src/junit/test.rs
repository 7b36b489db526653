use std::path::PathBuf;

use crate::junit::formatter::default_extension;
use crate::properties::PropertyTable;
use crate::target::Condition;

/// One test suite scheduled by the junit task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JUnitTest {
    pub name: String,
    pub todir: PathBuf,
    /// Report file name without extension
    pub outfile: Option<String>,
    pub halt_on_error: bool,
    pub halt_on_failure: bool,
    pub filter_trace: bool,
    pub error_property: Option<String>,
    pub failure_property: Option<String>,
    /// Index of the batch element that produced this test
    pub batch: Option<usize>,
}

impl JUnitTest {
    pub fn new(name: impl Into<String>, todir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            todir: todir.into(),
            outfile: None,
            halt_on_error: false,
            halt_on_failure: false,
            filter_trace: true,
            error_property: None,
            failure_property: None,
            batch: None,
        }
    }

    pub fn output_base(&self) -> String {
        self.outfile
            .clone()
            .unwrap_or_else(|| format!("TEST-{}", self.name))
    }

    pub fn output_file(&self, extension: &str) -> PathBuf {
        self.todir.join(format!("{}{}", self.output_base(), extension))
    }

    /// Settings that must agree for tests to share one forked process
    pub(crate) fn fork_key(&self) -> ForkKey {
        ForkKey {
            halt_on_error: self.halt_on_error,
            halt_on_failure: self.halt_on_failure,
            filter_trace: self.filter_trace,
            error_property: self.error_property.clone(),
            failure_property: self.failure_property.clone(),
        }
    }

    /// Stand-in reported when a batch process dies without naming its test
    pub fn batch_placeholder(&self) -> Self {
        let package = match self.name.rfind('.') {
            Some(index) if index > 0 => &self.name[..=index],
            _ => "",
        };
        let mut placeholder = self.clone();
        placeholder.name = format!("{}Batch-With-Multiple-Tests", package);
        placeholder.outfile = None;
        placeholder.batch = None;
        placeholder
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ForkKey {
    halt_on_error: bool,
    halt_on_failure: bool,
    filter_trace: bool,
    error_property: Option<String>,
    failure_property: Option<String>,
}

/// A configured result formatter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterElement {
    pub kind: String,
    pub use_file: bool,
    pub extension: Option<String>,
    pub if_condition: Option<Condition>,
    pub unless_condition: Option<Condition>,
}

impl FormatterElement {
    pub fn new(kind: impl Into<String>, use_file: bool) -> Self {
        Self {
            kind: kind.into(),
            use_file,
            extension: None,
            if_condition: None,
            unless_condition: None,
        }
    }

    pub fn extension(&self) -> String {
        self.extension
            .clone()
            .unwrap_or_else(|| default_extension(&self.kind).to_string())
    }

    pub fn is_active(&self, properties: &PropertyTable) -> bool {
        self.if_condition
            .as_ref()
            .map_or(true, |c| c.holds(properties))
            && !self
                .unless_condition
                .as_ref()
                .map_or(false, |c| c.holds(properties))
    }

    /// Report file for `test`, or `None` when writing to the build log
    pub fn output_for(&self, test: &JUnitTest) -> Option<PathBuf> {
        self.use_file.then(|| test.output_file(&self.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_files() {
        let mut test = JUnitTest::new("suites.smoke", "reports");
        assert_eq!(
            test.output_file(".xml"),
            PathBuf::from("reports/TEST-suites.smoke.xml")
        );
        test.outfile = Some("smoke".into());
        assert_eq!(test.output_file(".txt"), PathBuf::from("reports/smoke.txt"));

        let xml = FormatterElement::new("xml", true);
        assert_eq!(xml.output_for(&test), Some(PathBuf::from("reports/smoke.xml")));
        assert!(FormatterElement::new("plain", false).output_for(&test).is_none());
    }

    #[test]
    fn test_batch_placeholder_keeps_package() {
        let test = JUnitTest::new("suites.unit.parser", "reports");
        let placeholder = test.batch_placeholder();
        assert_eq!(placeholder.name, "suites.unit.Batch-With-Multiple-Tests");
        assert_eq!(placeholder.todir, PathBuf::from("reports"));

        let flat = JUnitTest::new("parser", "reports").batch_placeholder();
        assert_eq!(flat.name, "Batch-With-Multiple-Tests");
    }

    #[test]
    fn test_formatter_conditions() {
        let mut element = FormatterElement::new("xml", true);
        element.if_condition = Condition::parse("t", "if", "reports").unwrap();
        let mut properties = PropertyTable::new();
        assert!(!element.is_active(&properties));
        properties.set_property("reports", "on");
        assert!(element.is_active(&properties));
    }
}
