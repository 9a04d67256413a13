//! The composition arena
//!
//! Every declaration lands in a [`Composition`], keyed by [`NodeId`] in
//! declaration order. Ownership is an explicit parent id, and identities are
//! unique among siblings. A node can only reference nodes that already exist
//! in the same composition, so the dependency graph is acyclic by construction.

use crate::error::{Error, Result};
use crate::resource::{DeclareOptions, Inputs, NodeHandle, ProviderRef, ResourceNode};
use crate::types::NodeId;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// All declarations for one run
#[derive(Debug)]
pub struct Composition {
    project: String,
    /// Stamped on every handle this composition issues
    tag: u64,
    nodes: Vec<ResourceNode>,
    siblings: HashMap<(Option<NodeId>, String), NodeId>,
}

impl Composition {
    /// Create an empty composition for a project
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            tag: NEXT_TAG.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            siblings: HashMap::new(),
        }
    }

    /// Project the composition belongs to
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Declare a resource
    ///
    /// Fails with [`Error::DuplicateIdentity`] if a sibling already uses the
    /// identity, and with [`Error::UnknownNode`] if the parent, provider or any
    /// input refers to a node that was never declared here. Handles issued by
    /// another composition are unknown even when their id is in range. Inputs
    /// are recorded, not resolved.
    pub fn declare(
        &mut self,
        kind: &str,
        identity: &str,
        opts: DeclareOptions,
        inputs: Inputs,
    ) -> Result<NodeHandle> {
        self.insert(kind, identity, opts, inputs, false)
    }

    /// Declare a component node that groups other declarations
    pub fn component(
        &mut self,
        kind: &str,
        identity: &str,
        opts: DeclareOptions,
    ) -> Result<NodeHandle> {
        self.insert(kind, identity, opts, Inputs::new(), true)
    }

    fn insert(
        &mut self,
        kind: &str,
        identity: &str,
        opts: DeclareOptions,
        inputs: Inputs,
        component: bool,
    ) -> Result<NodeHandle> {
        if identity.is_empty() {
            return Err(Error::Configuration(format!(
                "{kind} declared with an empty identity"
            )));
        }

        let handles = opts
            .parent
            .iter()
            .chain(opts.provider.as_ref().map(ProviderRef::handle))
            .map(|h| (h.id(), h.origin()));
        let outputs = inputs.references().map(|r| (r.node, r.origin()));
        if let Some((missing, _)) = handles
            .chain(outputs)
            .find(|(id, origin)| *origin != self.tag || id.0 >= self.nodes.len())
        {
            return Err(Error::UnknownNode(missing));
        }

        let parent = opts.parent.as_ref().map(NodeHandle::id);
        let key = (parent, identity.to_string());
        if self.siblings.contains_key(&key) {
            return Err(Error::DuplicateIdentity {
                identity: identity.to_string(),
                scope: self.scope_name(parent),
            });
        }

        let provider = opts
            .provider
            .or_else(|| self.inherited_provider(parent, kind));

        let id = NodeId(self.nodes.len());
        let node = ResourceNode {
            id,
            kind: kind.to_string(),
            identity: identity.to_string(),
            parent,
            provider,
            inputs,
            secret_outputs: opts.secret_outputs,
            component,
            origin: self.tag,
        };
        log::debug!("declared {} '{}' as {}", node.kind, node.identity, id);

        let handle = node.handle();
        self.siblings.insert(key, id);
        self.nodes.push(node);
        Ok(handle)
    }

    /// Provider a child inherits from its nearest ancestor with one for the same package
    ///
    /// `kubernetes:core/v1:Namespace` inherits a `pulumi:providers:kubernetes`
    /// provider, never an AWS one.
    fn inherited_provider(&self, parent: Option<NodeId>, kind: &str) -> Option<ProviderRef> {
        let package = kind.split(':').next()?;
        let mut current = parent.and_then(|p| self.node(p));
        while let Some(node) = current {
            if let Some(provider) = &node.provider
                && provider.handle().kind().rsplit(':').next() == Some(package)
            {
                return Some(provider.clone());
            }
            current = node.parent.and_then(|p| self.node(p));
        }
        None
    }

    fn scope_name(&self, parent: Option<NodeId>) -> String {
        match parent.and_then(|p| self.node(p)) {
            Some(node) => format!("'{}'", node.identity),
            None => "the root".to_string(),
        }
    }

    /// Run a builder, discarding everything it declared if it fails
    ///
    /// A failing group leaves the composition exactly as it was before.
    pub fn atomically<T>(&mut self, build: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.nodes.len();
        let result = build(self);
        if result.is_err() && self.nodes.len() > checkpoint {
            log::debug!(
                "rolling back {} declaration(s)",
                self.nodes.len() - checkpoint
            );
            self.nodes.truncate(checkpoint);
            self.siblings.retain(|_, id| id.0 < checkpoint);
        }
        result
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id.0)
    }

    /// All nodes in declaration order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Direct children of a node
    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = &ResourceNode> {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(parent))
    }

    /// Number of declared nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing was declared
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slash-separated chain of identities from the root down to a node
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = self.node(id);
        while let Some(node) = current {
            parts.push(node.identity.as_str());
            current = node.parent.and_then(|p| self.node(p));
        }
        parts.reverse();
        parts.join("/")
    }

    /// Order in which nodes can be torn down
    ///
    /// Every node appears before anything it depends on, so children go before
    /// their parents and consumers before the providers they target.
    pub fn teardown_order(&self) -> Vec<NodeId> {
        // Dependencies always have smaller ids, so reverse declaration order
        // is a valid reverse topological order.
        self.nodes.iter().rev().map(|n| n.id).collect()
    }

    /// Nodes that depend (directly or transitively) on the given node
    pub fn dependents(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut found = BTreeSet::new();
        for node in self.nodes.iter().skip(id.0 + 1) {
            let deps = node.dependencies();
            if deps.contains(&id) || deps.iter().any(|d| found.contains(d)) {
                found.insert(node.id);
            }
        }
        found
    }
}
