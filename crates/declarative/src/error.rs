//! Error types for resource composition.
//!
//! Errors fall into three families:
//! - configuration errors, raised while the graph is being declared
//! - propagation errors, raised when a transform over a deferred value fails
//! - engine errors, reported by whatever realizes the declared nodes
//!
//! None of them are retried here.

use crate::types::NodeId;
use thiserror::Error;

/// Errors that can occur while declaring or resolving a composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Two siblings under the same parent share an identity
    #[error("duplicate identity '{identity}' under {scope}")]
    DuplicateIdentity {
        /// The identity that was declared twice
        identity: String,
        /// Human-readable name of the parent scope (or "the root")
        scope: String,
    },

    /// A parent, provider or input references a node that was never declared
    #[error("reference to undeclared node {0}")]
    UnknownNode(NodeId),

    /// A required input or option was not supplied
    #[error("missing required input '{input}' for {owner}")]
    MissingInput {
        /// Name of the missing input
        input: String,
        /// Identity of the node or group that needed it
        owner: String,
    },

    /// Invalid configuration (unrecognized discriminator, bad name, ...)
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A deferred output was read before its node was realized
    #[error("output '{attribute}' of node {node} is not resolved")]
    Unresolved {
        /// Node that should produce the attribute
        node: NodeId,
        /// Attribute name
        attribute: String,
    },

    /// A pure transform over a deferred value failed
    #[error("transform failed: {0}")]
    Propagation(String),

    /// The engine failed to realize a node
    #[error("engine failed to realize '{identity}': {message}")]
    Engine {
        /// Identity of the node being realized
        identity: String,
        /// Engine-provided message, passed through untouched
        message: String,
    },

    /// Construction of one target of a multi-target composition failed
    #[error("target '{target}' failed: {source}")]
    Target {
        /// Name of the failing target
        target: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns true for errors raised while declaring the graph
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::DuplicateIdentity { .. }
            | Error::UnknownNode(_)
            | Error::MissingInput { .. }
            | Error::Configuration(_) => true,
            Error::Target { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Returns true if a transform (or an unresolved upstream) caused the failure
    pub fn is_propagation(&self) -> bool {
        matches!(self, Error::Propagation(_) | Error::Unresolved { .. })
    }

    /// Returns true if the failure came from the engine
    pub fn is_engine(&self) -> bool {
        matches!(self, Error::Engine { .. })
    }

    /// Attach the name of the target whose construction failed
    pub fn in_target(self, target: impl Into<String>) -> Self {
        Error::Target {
            target: target.into(),
            source: Box::new(self),
        }
    }
}

/// Result type for composition operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let dup = Error::DuplicateIdentity {
            identity: "bucket".into(),
            scope: "the root".into(),
        };
        assert!(dup.is_configuration());
        assert!(!dup.is_propagation());

        let wrapped = dup.in_target("eks-demo-cluster");
        assert!(wrapped.is_configuration());
        assert!(wrapped.to_string().contains("eks-demo-cluster"));

        let transform = Error::Propagation("bad json".into());
        assert!(transform.is_propagation());
        assert!(!transform.is_engine());

        let engine = Error::Engine {
            identity: "vpc".into(),
            message: "quota exceeded".into(),
        };
        assert!(engine.is_engine());
        assert_eq!(
            engine.to_string(),
            "engine failed to realize 'vpc': quota exceeded"
        );
    }
}
