//! Command-line front end for the confidence-gated pipeline: HTTP service
//! adapters, a terminal arbiter, config loading and the interactive and
//! batch loops.

pub mod config;
pub mod services;
pub mod session;
pub mod terminal;

pub use config::{FileConfig, Overrides, ServiceConfig};
pub use services::{HttpPrimaryService, HttpZeroShotService};
pub use session::{run_batch, InteractiveSession, Outcome, SessionStats};
pub use terminal::{Console, TerminalArbiter};
