//! Service implementations for the `PipelineApi` trait
//!
//! The live HTTP client lives in `dp2-connect` (`RemotePipeline`). This
//! module provides the in-memory `MockPipeline` used by the tests.

pub mod mock;

pub use mock::MockPipeline;
