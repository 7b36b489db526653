//! # Anthill Test Protocol
//!
//! The contract between the `junit` task running inside a build and the
//! test runner it forks into a separate process. The two processes share no
//! memory; everything crosses the boundary through four channels:
//!
//! 1. **Command-line tokens** - see [`ForkArgs`]. The first token is the test
//!    name (or `testsfile=<path>` for a batch), followed by `key=value` flags
//!    and one `formatter=<kind>[,<file>]` token per result formatter.
//! 2. **A properties file** - a flat dump of the build properties at fork
//!    time, see [`write_properties`] / [`read_properties`].
//! 3. **A crash file** - a single line the child overwrites before every test
//!    case and once more on clean exit, see [`CrashFile`].
//! 4. **The exit code** - see [`ExitCode`].
//!
//! Batched runs additionally pass a tests file with one [`BatchEntry`] per line.
//!
//! ## Example
//!
//! ```rust
//! use anthill_test_protocol::{ForkArgs, FormatterSpec, TestTarget};
//!
//! let args = ForkArgs {
//!     formatters: vec![FormatterSpec::new("xml", Some("reports/TEST-smoke.xml".into()))],
//!     ..ForkArgs::new(
//!         TestTarget::Single("smoke".to_string()),
//!         "/tmp/watcher.properties",
//!         "/tmp/props.properties",
//!     )
//! };
//!
//! let tokens = args.to_args();
//! assert_eq!(tokens[0], "smoke");
//! assert!(tokens.contains(&"formatter=xml,reports/TEST-smoke.xml".to_string()));
//!
//! let parsed = ForkArgs::parse(&tokens).unwrap();
//! assert_eq!(parsed, args);
//! ```

pub mod args;
pub mod batch;
pub mod constants;
pub mod crash;
pub mod error;
pub mod properties;

pub use args::{ForkArgs, FormatterSpec, TestTarget};
pub use batch::{read_batch_file, write_batch_file, BatchEntry};
pub use constants::ExitCode;
pub use crash::{CrashFile, CrashState};
pub use error::{ProtocolError, ProtocolResult};
pub use properties::{read_properties, write_properties};
