//! Result formatters and the fan-out that drives them
//!
//! Every formatter sees the same callbacks in the same order: suite start,
//! then per case start / failure or error / end, then the captured output,
//! then suite end. A formatter error stops the run and propagates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::junit::formatters::{BriefFormatter, PlainFormatter, SummaryFormatter, XmlFormatter};
use crate::junit::result::SuiteReport;
use crate::junit::test::{FormatterElement, JUnitTest};
use crate::types::{BuildError, BuildResult};

/// Receives test lifecycle callbacks and renders them somewhere
pub trait ResultFormatter {
    /// Where to write; called once before the suite starts
    fn set_output(&mut self, out: Box<dyn Write>);

    fn start_test_suite(&mut self, _suite: &SuiteReport) -> anyhow::Result<()> {
        Ok(())
    }

    /// `suite` carries the final counts and run time
    fn end_test_suite(&mut self, _suite: &SuiteReport) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_test(&mut self, _test: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn end_test(&mut self, _test: &str, _duration: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_failure(&mut self, _test: &str, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// `test` is `None` for errors outside any case, e.g. a suite that cannot load
    fn add_error(&mut self, _test: Option<&str>, _message: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_system_output(&mut self, _output: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_system_error(&mut self, _output: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Broadcasts every callback to all formatters in registration order
#[derive(Default)]
pub struct FormatterFanout {
    formatters: Vec<Box<dyn ResultFormatter>>,
}

impl FormatterFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, formatter: Box<dyn ResultFormatter>) {
        self.formatters.push(formatter);
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    pub fn start_test_suite(&mut self, suite: &SuiteReport) -> BuildResult<()> {
        self.each(|f| f.start_test_suite(suite))
    }

    pub fn end_test_suite(&mut self, suite: &SuiteReport) -> BuildResult<()> {
        self.each(|f| f.end_test_suite(suite))
    }

    pub fn start_test(&mut self, test: &str) -> BuildResult<()> {
        self.each(|f| f.start_test(test))
    }

    pub fn end_test(&mut self, test: &str, duration: Duration) -> BuildResult<()> {
        self.each(|f| f.end_test(test, duration))
    }

    pub fn add_failure(&mut self, test: &str, message: &str) -> BuildResult<()> {
        self.each(|f| f.add_failure(test, message))
    }

    pub fn add_error(&mut self, test: Option<&str>, message: &str) -> BuildResult<()> {
        self.each(|f| f.add_error(test, message))
    }

    pub fn set_system_output(&mut self, output: &str) -> BuildResult<()> {
        self.each(|f| f.set_system_output(output))
    }

    pub fn set_system_error(&mut self, output: &str) -> BuildResult<()> {
        self.each(|f| f.set_system_error(output))
    }

    fn each<F>(&mut self, mut call: F) -> BuildResult<()>
    where
        F: FnMut(&mut dyn ResultFormatter) -> anyhow::Result<()>,
    {
        for formatter in &mut self.formatters {
            call(formatter.as_mut()).map_err(BuildError::Formatter)?;
        }
        Ok(())
    }
}

type FormatterFactory = Box<dyn Fn() -> Box<dyn ResultFormatter>>;

/// Formatter kinds by name
pub struct FormatterRegistry {
    factories: HashMap<String, FormatterFactory>,
}

impl FormatterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// `plain`, `brief`, `xml` and `summary`
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("plain", || Box::new(PlainFormatter::new()));
        registry.register("brief", || Box::new(BriefFormatter::new()));
        registry.register("xml", || Box::new(XmlFormatter::new()));
        registry.register("summary", || Box::new(SummaryFormatter::new(false)));
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ResultFormatter> + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn create(&self, kind: &str) -> BuildResult<Box<dyn ResultFormatter>> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| BuildError::Config(format!("Unknown formatter type '{}'", kind)))
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("FormatterRegistry").field("kinds", &kinds).finish()
    }
}

/// Report file extension of a formatter kind
pub fn default_extension(kind: &str) -> &'static str {
    match kind {
        "xml" => ".xml",
        _ => ".txt",
    }
}

/// Open a report file, creating its directory
pub fn open_report(path: &Path) -> BuildResult<Box<dyn Write>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).map_err(|e| {
        BuildError::failure(format!("Unable to open file {}: {}", path.display(), e))
    })?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Fan-out reporting on `test`. File formatters write their report files;
/// the others, and the summary when requested, write into the returned
/// buffers, which the caller copies into the build log.
pub fn fanout_for_test(
    registry: &FormatterRegistry,
    elements: &[&FormatterElement],
    test: &JUnitTest,
    print_summary: bool,
) -> BuildResult<(FormatterFanout, Vec<SharedBuffer>)> {
    let mut fanout = FormatterFanout::new();
    let mut log_buffers = Vec::new();
    let mut attach = |mut formatter: Box<dyn ResultFormatter>, file: Option<&Path>| -> BuildResult<()> {
        match file {
            Some(path) => formatter.set_output(open_report(path)?),
            None => {
                let buffer = SharedBuffer::new();
                formatter.set_output(Box::new(buffer.clone()));
                log_buffers.push(buffer);
            }
        }
        fanout.push(formatter);
        Ok(())
    };

    for element in elements {
        let file = element.output_for(test);
        attach(registry.create(&element.kind)?, file.as_deref())?;
    }
    if print_summary {
        attach(registry.create("summary")?, None)?;
    }
    Ok((fanout, log_buffers))
}

/// In-memory writer whose contents stay readable after the formatter drops it
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Seconds with up to three decimals, trailing zeros dropped: `0.25`, `1`, `12.345`
pub fn format_seconds(duration: Duration) -> String {
    let text = format!("{:.3}", duration.as_secs_f64());
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}
