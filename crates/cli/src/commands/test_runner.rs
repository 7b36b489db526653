//! Child side of a forked test run. Suite names resolve against the
//! working directory the junit task starts us in.

use anthill_core::junit::{run_forked, FileSuiteLoader, FormatterRegistry};
use anyhow::Result;

pub fn execute(args: &[String]) -> Result<()> {
    let loader = FileSuiteLoader::new(std::env::current_dir()?);
    let code = run_forked(args, &loader, &FormatterRegistry::with_builtins());
    std::process::exit(code)
}
