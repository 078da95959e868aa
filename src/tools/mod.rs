//! Tool Execution Subsystem
//!
//! Everything between "a caller wants tool X against target Y" and the
//! structured result of running it.
//!
//! # Security Model
//!
//! - **List Invocation**: commands are argument vectors, never shell strings
//! - **Program Whitelist**: only registered scanner binaries may run
//! - **Input Validation**: positional values cannot turn into options, and
//!   free-form options cannot carry shell syntax
//! - **Timeout Enforcement**: every run is bounded; expired processes are
//!   terminated and reaped
//!
//! # Architecture
//!
//! - `registry.rs`: the tools both front-ends expose
//! - `builder.rs`: typed parameters to [`CommandSpec`]
//! - `validator.rs`: program whitelist and argument checks
//! - `executor.rs`: the bounded process runner
//! - `timeout.rs`: timeout values and wording
//! - `adapters.rs`: [`Toolbox`], builder plus runner plus per-tool timeouts
//!
//! # Example
//!
//! ```no_run
//! use kalidocker::tools::{
//!     ExecutionTarget, NetworkScan, ProcessRunner, RunnerConfig, ToolTimeouts, Toolbox,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = ProcessRunner::new(ExecutionTarget::Host, RunnerConfig::default());
//!     let toolbox = Toolbox::new(runner, ToolTimeouts::default());
//!
//!     let result = toolbox.scan_network(NetworkScan::new("10.0.0.1")).await;
//!     println!("{}", result.summary());
//! }
//! ```

mod adapters;
mod builder;
mod executor;
mod registry;
mod timeout;
mod validator;

pub use adapters::{ToolTimeouts, Toolbox};
pub use builder::{
    CommandSpec, ContentScan, EndpointFuzz, NetworkScan, ParameterDiscovery, ToolInvocation,
    UrlProbe, VulnerabilityScan, WebServerScan, DEFAULT_METHOD, DEFAULT_SCAN_TYPE,
    DEFAULT_WORDLIST,
};
pub use executor::{
    ExecutionResult, ExecutionTarget, ProcessRunner, RunnerConfig, SENTINEL_EXIT_CODE,
};
pub use registry::{ToolKind, UnknownTool};
pub use timeout::{ExecutionTimeout, TimedOut};
pub use validator::{CommandValidationError, CommandValidator};
