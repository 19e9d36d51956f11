//! DP2 Connect: HTTP connectivity to a DAISY Pipeline 2 web service
//!
//! This crate provides the live implementation of the `PipelineApi`
//! capability set defined in `dp2-core-interface`.
//!
//! # Architecture
//!
//! - **RemotePipeline**: Implements `PipelineApi` over the service's REST resources
//! - **RequestSigner**: HMAC signing of request URLs for services that require authentication
//!
//! # Example
//!
//! ```rust,no_run
//! use dp2_connect::RemotePipeline;
//! use dp2_core_interface::{Credentials, PipelineApi};
//! use std::time::Duration;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let pipeline = RemotePipeline::new("http://localhost:8181/ws/", Duration::from_secs(10))?;
//!     pipeline.set_credentials(Credentials::new("clientid", "supersecret"));
//!
//!     for job in pipeline.jobs().await? {
//!         println!("{} [{}]", job.id, job.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod signer;

pub use error::ConnectError;
pub use pipeline::RemotePipeline;
pub use signer::RequestSigner;
