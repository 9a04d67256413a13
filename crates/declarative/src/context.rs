//! Engine boundary and progress callbacks
//!
//! These traits keep the crate free of any particular infrastructure engine,
//! cloud SDK or UI framework.

use crate::resource::ResourceNode;
use crate::types::{Attributes, RealizeResult};
use anyhow::Result;

/// Realizes declared nodes
///
/// Implementations own everything the composition core does not: talking to
/// cloud control planes, persisting state, retrying. Errors are surfaced to the
/// caller unchanged.
pub trait Engine: Send + Sync {
    /// Realize one node from its resolved inputs and return its output attributes
    fn realize(&self, node: &ResourceNode, inputs: &Attributes) -> Result<Attributes>;
}

/// Progress callback for convergence
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a wave of independent nodes
    fn on_wave_start(&mut self, wave: usize, count: usize);

    /// Called when starting to realize a single node
    fn on_node_start(&mut self, identity: &str, kind: &str);

    /// Called when a node completes
    fn on_node_complete(&mut self, identity: &str, result: &RealizeResult);

    /// Called when a wave completes
    fn on_wave_complete(&mut self, wave: usize);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_wave_start(&mut self, _wave: usize, _count: usize) {}
    fn on_node_start(&mut self, _identity: &str, _kind: &str) {}
    fn on_node_complete(&mut self, _identity: &str, _result: &RealizeResult) {}
    fn on_wave_complete(&mut self, _wave: usize) {}
}
