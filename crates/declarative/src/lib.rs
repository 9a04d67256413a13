//! # Declarative
//!
//! A framework for declarative resource composition.
//!
//! This crate provides the core abstractions for describing infrastructure as a
//! graph of declarations, threading not-yet-known outputs between them, and
//! handing the graph to an engine that realizes it.
//!
//! ## Core Concepts
//!
//! - **ResourceNode**: One declared resource (kind, identity, parent, provider, inputs)
//! - **Deferred**: A value only known once the engine resolves upstream nodes
//! - **Composition**: The arena all declarations of a run live in
//! - **Component**: A named group of declarations with a fixed public surface
//! - **ConvergencePlan**: Declarations grouped into dependency waves
//! - **Engine**: Realizes nodes; everything stateful lives behind it
//!
//! ## Example
//!
//! ```
//! use declarative::{Composition, DeclareOptions, Inputs};
//!
//! let mut comp = Composition::new("demo");
//! let bucket = comp.declare(
//!     "aws:s3/bucket:Bucket",
//!     "charts",
//!     DeclareOptions::new(),
//!     Inputs::new(),
//! )?;
//!
//! // The policy depends on the bucket name without ever reading it.
//! let arn = bucket
//!     .output_string("bucket")
//!     .map(|name| format!("arn:aws:s3:::{name}"));
//! comp.declare(
//!     "aws:iam/userPolicy:UserPolicy",
//!     "charts-policy",
//!     DeclareOptions::new(),
//!     Inputs::new().set("resource", arn),
//! )?;
//!
//! assert_eq!(comp.len(), 2);
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`Engine`]: Realizes a node from its resolved inputs
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be used without hard dependencies on a specific
//! infrastructure engine, cloud SDK or UI framework.

pub mod component;
pub mod composition;
pub mod context;
pub mod deferred;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod summary;
pub mod types;

// Re-export main types at crate root
pub use component::{Component, Scope, group_outputs};
pub use composition::Composition;
pub use context::{Engine, NoProgress, ProgressCallback};
pub use deferred::{Deferred, OutputRef, Resolved};
pub use error::{Error, Result};
pub use executor::{Convergence, converge, converge_all};
pub use planner::ConvergencePlan;
pub use resource::{DeclareOptions, Input, Inputs, NodeHandle, ProviderRef, ResourceNode};
pub use summary::{Declaration, DeclarationSummary, declarations, group_by_type};
pub use types::{Attributes, ConvergeOptions, ConvergeSummary, NodeId, RealizeResult};
