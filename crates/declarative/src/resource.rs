//! Resource declarations
//!
//! A [`ResourceNode`] is one request to the engine: a kind (type token), an
//! identity unique among its siblings, an optional owner, an optional provider
//! and a bag of inputs. Inputs are either literals or [`Deferred`] references to
//! other nodes' outputs; nothing is resolved at declaration time.

use crate::deferred::{Deferred, OutputRef};
use crate::types::NodeId;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A single input property
#[derive(Debug, Clone)]
pub enum Input {
    /// Known at declaration time
    Literal(Value),
    /// Produced by other nodes; recorded as a dependency edge
    Deferred(Deferred<Value>),
}

impl Input {
    /// Nodes this input depends on
    pub fn depends_on(&self) -> BTreeSet<NodeId> {
        match self {
            Input::Literal(_) => BTreeSet::new(),
            Input::Deferred(d) => d.depends_on(),
        }
    }

    /// Whether the input is a deferred reference
    pub fn is_deferred(&self) -> bool {
        matches!(self, Input::Deferred(_))
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Literal(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Literal(Value::String(value))
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Literal(Value::Bool(value))
    }
}

impl From<u32> for Input {
    fn from(value: u32) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<Deferred<Value>> for Input {
    fn from(value: Deferred<Value>) -> Self {
        Input::Deferred(value)
    }
}

impl From<Deferred<String>> for Input {
    fn from(value: Deferred<String>) -> Self {
        Input::Deferred(value.map(Value::String))
    }
}

/// Ordered input properties of a declaration
#[derive(Debug, Clone, Default)]
pub struct Inputs(BTreeMap<String, Input>);

impl Inputs {
    /// Create an empty input bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Input>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Set a property only when a value is present
    pub fn set_opt<V: Into<Input>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    /// Look up a property
    pub fn get(&self, name: &str) -> Option<&Input> {
        self.0.get(name)
    }

    /// Iterate properties in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Input)> {
        self.0.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no properties
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nodes referenced by any deferred input
    pub fn depends_on(&self) -> BTreeSet<NodeId> {
        self.0.values().flat_map(Input::depends_on).collect()
    }

    /// Every output attribute the deferred inputs were built from
    pub fn references(&self) -> impl Iterator<Item = &OutputRef> {
        self.0
            .values()
            .filter_map(|input| match input {
                Input::Deferred(d) => Some(d.dependencies()),
                Input::Literal(_) => None,
            })
            .flatten()
    }

    /// Number of deferred inputs
    pub fn deferred_count(&self) -> usize {
        self.0.values().filter(|i| i.is_deferred()).count()
    }
}

/// Opaque reference to the backend a node is realized against
///
/// Typically a Kubernetes provider configured with one cluster's kubeconfig.
/// Many nodes may share one provider; nothing mutates it after declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRef(NodeHandle);

impl ProviderRef {
    /// Use a declared node as a provider
    pub fn new(handle: NodeHandle) -> Self {
        Self(handle)
    }

    /// Node backing this provider
    pub fn node(&self) -> NodeId {
        self.0.id()
    }

    /// Identity of the provider node
    pub fn identity(&self) -> &str {
        self.0.identity()
    }

    /// Underlying handle
    pub fn handle(&self) -> &NodeHandle {
        &self.0
    }
}

/// Ownership and targeting options for a declaration
#[derive(Debug, Clone, Default)]
pub struct DeclareOptions {
    pub parent: Option<NodeHandle>,
    pub provider: Option<ProviderRef>,
    /// Output attributes whose values must be treated as secrets
    pub secret_outputs: Vec<String>,
}

impl DeclareOptions {
    /// Options with no parent and the ambient provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning node
    pub fn parent(mut self, parent: &NodeHandle) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Set the provider the node is realized against
    pub fn provider(mut self, provider: &ProviderRef) -> Self {
        self.provider = Some(provider.clone());
        self
    }

    /// Mark an output attribute as secret
    pub fn secret_output(mut self, attribute: impl Into<String>) -> Self {
        self.secret_outputs.push(attribute.into());
        self
    }
}

/// A declared node in a composition
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub id: NodeId,
    /// Type token, e.g. `aws:s3/bucket:Bucket`
    pub kind: String,
    pub identity: String,
    pub parent: Option<NodeId>,
    pub provider: Option<ProviderRef>,
    pub inputs: Inputs,
    pub secret_outputs: Vec<String>,
    /// Logical grouping node with no backing resource of its own
    pub component: bool,
    /// Tag of the owning composition
    pub(crate) origin: u64,
}

impl ResourceNode {
    /// Every node this one must be realized after
    ///
    /// Includes the owner, the provider node and every node an input refers to.
    pub fn dependencies(&self) -> BTreeSet<NodeId> {
        let mut deps = self.inputs.depends_on();
        if let Some(parent) = self.parent {
            deps.insert(parent);
        }
        if let Some(provider) = &self.provider {
            deps.insert(provider.node());
        }
        deps
    }

    /// Whether the node is a provider other nodes can target
    pub fn is_provider(&self) -> bool {
        self.kind.starts_with("pulumi:providers:")
    }

    /// A handle for referring to this node's outputs
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            id: self.id,
            origin: self.origin,
            kind: self.kind.clone(),
            identity: self.identity.clone(),
            secret_outputs: self.secret_outputs.clone().into(),
        }
    }
}

/// Cheap reference to a declared node, returned from `declare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    id: NodeId,
    origin: u64,
    kind: String,
    identity: String,
    secret_outputs: Arc<[String]>,
}

impl NodeHandle {
    /// Node id in the owning composition
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Tag of the composition that issued the handle
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Type token
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identity given at declaration
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Deferred reference to one output attribute
    pub fn output(&self, attribute: &str) -> Deferred<Value> {
        let secret = self.secret_outputs.iter().any(|s| s == attribute);
        Deferred::output(self.origin, self.id, attribute, secret)
    }

    /// Deferred reference to a string output attribute
    pub fn output_string(&self, attribute: &str) -> Deferred<String> {
        self.output(attribute).as_string()
    }

    /// Treat this node as a provider for other declarations
    pub fn as_provider(&self) -> ProviderRef {
        ProviderRef::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle(id: usize, secrets: &[&str]) -> NodeHandle {
        NodeHandle {
            id: NodeId(id),
            origin: 0,
            kind: "test:index:Thing".into(),
            identity: format!("thing-{id}"),
            secret_outputs: secrets.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_inputs_track_deferred_dependencies() {
        let user = handle(2, &[]);
        let bucket = handle(1, &[]);
        let inputs = Inputs::new()
            .set("path", "/chartmuseum/")
            .set("user", user.output("name"))
            .set("policy", bucket.output_string("bucket"))
            .set_opt("tags", None::<Value>)
            .set("enabled", true);

        assert_eq!(inputs.len(), 4);
        assert_eq!(inputs.deferred_count(), 2);
        assert_eq!(inputs.depends_on(), BTreeSet::from([NodeId(1), NodeId(2)]));
        assert!(matches!(inputs.get("enabled"), Some(Input::Literal(v)) if *v == json!(true)));
    }

    #[test]
    fn test_node_dependencies_include_parent_and_provider() {
        let provider = handle(0, &[]).as_provider();
        let node = ResourceNode {
            id: NodeId(5),
            kind: "kubernetes:core/v1:Namespace".into(),
            identity: "ns".into(),
            parent: Some(NodeId(3)),
            provider: Some(provider),
            inputs: Inputs::new().set("metadata", handle(4, &[]).output("name")),
            secret_outputs: Vec::new(),
            component: false,
            origin: 0,
        };
        assert_eq!(
            node.dependencies(),
            BTreeSet::from([NodeId(0), NodeId(3), NodeId(4)])
        );
    }

    #[test]
    fn test_secret_outputs_mark_deferred_values() {
        let key = handle(7, &["secret"]);
        assert!(key.output("secret").is_secret());
        assert!(!key.output("id").is_secret());
    }
}
