//! Core types for resource composition

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute bag produced by (or fed into) a realized node
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Position of a node in its composition's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Index of the node in declaration order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of realizing a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealizeResult {
    /// The engine realized the node and returned its attributes
    Created,
    /// Realizing failed (engine error or failed input transform)
    Failed { error: String },
    /// Not attempted because something it depends on did not resolve
    Skipped { reason: String },
}

impl RealizeResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the node was realized
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Summary of a convergence run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergeSummary {
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ConvergeSummary {
    /// Check if every attempted node was realized
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Total number of nodes processed
    pub fn total(&self) -> usize {
        self.created + self.failed + self.skipped
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ConvergeSummary) {
        self.created += other.created;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &RealizeResult) {
        match result {
            RealizeResult::Created => self.created += 1,
            RealizeResult::Failed { .. } => self.failed += 1,
            RealizeResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for convergence
#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    /// Number of nodes realized in parallel within a wave
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ConvergeOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            verbose: false,
        }
    }
}
