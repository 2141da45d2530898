//! Workspace-level integration tests for the announcement bridge.
//!
//! These tests drive the whole pipeline without a broker or real speech
//! engines:
//! - text in, WAV on disk, URL out, file downloadable from that URL
//! - retention as seen by a downloading display
//! - startup wiring from configuration

pub mod pipeline;
pub mod retention_flow;
pub mod startup;

#[cfg(all(test, unix))]
pub(crate) mod support;
