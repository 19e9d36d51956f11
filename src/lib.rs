/*!
 * dp2 - command-line client for the DAISY Pipeline 2 web service
 *
 * The library half holds the link layer the `dp2` binary is built on:
 * - Bring-up of the service, starting a local instance when allowed
 * - Authentication handshake with client credentials
 * - Translation of job descriptions into service job requests
 * - Live message streams for running jobs
 * - Execution queue inspection and reordering
 */

pub mod archive;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod link;
pub mod logging;
pub mod system;

// Re-export commonly used types
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use link::{JobDescription, Link, LinkSession, MessageStream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
