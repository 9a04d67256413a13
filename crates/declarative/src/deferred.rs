//! Deferred values
//!
//! A [`Deferred`] is a placeholder for a value that only becomes known once the
//! engine has realized the nodes it depends on. It is never read directly:
//! consumers describe what to do with the value (`map`, `try_map`, `zip`, ...)
//! and hand the resulting deferred value to another declaration. The set of
//! [`OutputRef`]s a deferred value was built from is what the planner turns into
//! dependency edges.
//!
//! Resolution happens against a [`Resolved`] snapshot. Each realized node is
//! stamped with the generation it was inserted at, and results are memoised on
//! the stamps of the nodes a value depends on. A transform runs once per
//! resolution of its upstream no matter how many consumers share it, and
//! realizing unrelated nodes does not invalidate it.

use crate::error::{Error, Result};
use crate::types::{Attributes, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

static GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Reference to a single output attribute of a declared node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub node: NodeId,
    pub attribute: String,
    /// Tag of the composition the node was declared in
    #[serde(skip)]
    pub(crate) origin: u64,
}

impl OutputRef {
    /// Tag of the composition the node was declared in
    pub fn origin(&self) -> u64 {
        self.origin
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// Attributes the engine has produced so far
#[derive(Debug)]
pub struct Resolved {
    generation: u64,
    outputs: HashMap<NodeId, Attributes>,
    stamps: HashMap<NodeId, u64>,
}

impl Resolved {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self {
            generation: next_generation(),
            outputs: HashMap::new(),
            stamps: HashMap::new(),
        }
    }

    /// Record the attributes of a realized node
    ///
    /// Starts a new generation and stamps the node with it. Values derived from
    /// this node are recomputed on their next resolve; values that do not
    /// depend on it keep their memoised result.
    pub fn insert(&mut self, node: NodeId, attributes: Attributes) {
        self.outputs.insert(node, attributes);
        self.generation = next_generation();
        self.stamps.insert(node, self.generation);
    }

    /// Look up a single attribute
    pub fn get(&self, output: &OutputRef) -> Option<&Value> {
        self.outputs
            .get(&output.node)
            .and_then(|attrs| attrs.get(&output.attribute))
    }

    /// All attributes of a node, if it was realized
    pub fn attributes(&self, node: NodeId) -> Option<&Attributes> {
        self.outputs.get(&node)
    }

    /// Check if a node was realized
    pub fn contains(&self, node: NodeId) -> bool {
        self.outputs.contains_key(&node)
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation at which a node was last inserted
    pub fn node_generation(&self, node: NodeId) -> Option<u64> {
        self.stamps.get(&node).copied()
    }

    /// Number of realized nodes
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Check if nothing was realized yet
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Default for Resolved {
    fn default() -> Self {
        Self::new()
    }
}

type Eval<T> = dyn Fn(&Resolved) -> Result<T> + Send + Sync;

/// Insert stamps of the upstream nodes a result was computed from
type MemoKey = Vec<(NodeId, Option<u64>)>;

struct Inner<T> {
    dependencies: BTreeSet<OutputRef>,
    secret: bool,
    eval: Box<Eval<T>>,
    memo: Mutex<Option<(MemoKey, Result<T>)>>,
}

/// A value that is only known after the engine resolves its dependencies
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("dependencies", &self.inner.dependencies)
            .field("secret", &self.inner.secret)
            .finish_non_exhaustive()
    }
}

impl<T> Deferred<T> {
    /// Output attributes this value was built from
    pub fn dependencies(&self) -> &BTreeSet<OutputRef> {
        &self.inner.dependencies
    }

    /// Nodes this value depends on
    pub fn depends_on(&self) -> BTreeSet<NodeId> {
        self.inner.dependencies.iter().map(|d| d.node).collect()
    }

    /// Whether the value is derived from a secret output
    pub fn is_secret(&self) -> bool {
        self.inner.secret
    }

    /// Whether the value is a literal with no upstream nodes
    pub fn is_known(&self) -> bool {
        self.inner.dependencies.is_empty()
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_parts<F>(dependencies: BTreeSet<OutputRef>, secret: bool, eval: F) -> Self
    where
        F: Fn(&Resolved) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                dependencies,
                secret,
                eval: Box::new(eval),
                memo: Mutex::new(None),
            }),
        }
    }

    /// Wrap a value that is already known at declaration time
    pub fn known(value: T) -> Self {
        Self::from_parts(BTreeSet::new(), false, move |_| Ok(value.clone()))
    }

    /// Resolve against a snapshot
    ///
    /// Results (including failures) are cached until one of the upstream nodes
    /// is inserted again. Snapshots that agree on those nodes share the cache.
    pub fn resolve(&self, resolved: &Resolved) -> Result<T> {
        let key: MemoKey = self
            .depends_on()
            .into_iter()
            .map(|node| (node, resolved.node_generation(node)))
            .collect();
        let mut memo = self
            .inner
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, result)) = memo.as_ref()
            && *cached == key
        {
            return result.clone();
        }
        let result = (self.inner.eval)(resolved);
        *memo = Some((key, result.clone()));
        result
    }

    /// Apply a pure transform once the value resolves
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        Deferred::from_parts(
            self.inner.dependencies.clone(),
            self.inner.secret,
            move |resolved| source.resolve(resolved).map(&f),
        )
    }

    /// Apply a fallible transform; a failure becomes [`Error::Propagation`]
    pub fn try_map<U, E, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        E: fmt::Display,
        F: Fn(T) -> std::result::Result<U, E> + Send + Sync + 'static,
    {
        let source = self.clone();
        Deferred::from_parts(
            self.inner.dependencies.clone(),
            self.inner.secret,
            move |resolved| {
                let value = source.resolve(resolved)?;
                f(value).map_err(|e| Error::Propagation(e.to_string()))
            },
        )
    }

    /// Combine with another deferred value
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.clone();
        let right = other.clone();
        let dependencies = self
            .inner
            .dependencies
            .union(&other.inner.dependencies)
            .cloned()
            .collect();
        Deferred::from_parts(
            dependencies,
            self.inner.secret || other.inner.secret,
            move |resolved| Ok((left.resolve(resolved)?, right.resolve(resolved)?)),
        )
    }

    /// Combine many deferred values of the same type, keeping their order
    pub fn all(items: impl IntoIterator<Item = Deferred<T>>) -> Deferred<Vec<T>> {
        let items: Vec<Deferred<T>> = items.into_iter().collect();
        let dependencies = items
            .iter()
            .flat_map(|d| d.inner.dependencies.iter().cloned())
            .collect();
        let secret = items.iter().any(Deferred::is_secret);
        Deferred::from_parts(dependencies, secret, move |resolved| {
            items.iter().map(|d| d.resolve(resolved)).collect()
        })
    }

    /// Mark the value (and everything derived from it) as secret
    pub fn secret(&self) -> Self {
        let source = self.clone();
        Self::from_parts(self.inner.dependencies.clone(), true, move |resolved| {
            source.resolve(resolved)
        })
    }
}

impl<T> Deferred<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    /// Serialize the resolved value into JSON
    pub fn to_value(&self) -> Deferred<Value> {
        self.try_map(|value| serde_json::to_value(value))
    }
}

impl Deferred<Value> {
    /// Placeholder for one output attribute of a node
    pub(crate) fn output(origin: u64, node: NodeId, attribute: &str, secret: bool) -> Self {
        let output = OutputRef {
            node,
            attribute: attribute.to_string(),
            origin,
        };
        let dependencies = BTreeSet::from([output.clone()]);
        Self::from_parts(dependencies, secret, move |resolved| {
            resolved.get(&output).cloned().ok_or_else(|| Error::Unresolved {
                node: output.node,
                attribute: output.attribute.clone(),
            })
        })
    }

    /// Interpret the resolved value as a string
    ///
    /// Numbers and booleans are rendered; null is a propagation error.
    pub fn as_string(&self) -> Deferred<String> {
        self.try_map(|value| match value {
            Value::String(s) => Ok(s),
            Value::Null => Err("expected a string, found null".to_string()),
            other => Ok(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn snapshot(node: usize, attribute: &str, value: Value) -> Resolved {
        let mut resolved = Resolved::new();
        let mut attrs = Attributes::new();
        attrs.insert(attribute.to_string(), value);
        resolved.insert(NodeId(node), attrs);
        resolved
    }

    #[test]
    fn test_known_resolves_without_snapshot_entries() {
        let value = Deferred::known(42u32);
        assert!(value.is_known());
        assert_eq!(value.resolve(&Resolved::new()).unwrap(), 42);
    }

    #[test]
    fn test_output_unresolved_until_inserted() {
        let bucket = Deferred::output(0, NodeId(0), "bucket", false);
        let err = bucket.resolve(&Resolved::new()).unwrap_err();
        assert!(matches!(err, Error::Unresolved { .. }));

        let resolved = snapshot(0, "bucket", json!("charts-1a2b3c4"));
        assert_eq!(bucket.resolve(&resolved).unwrap(), json!("charts-1a2b3c4"));
    }

    #[test]
    fn test_map_composition_law() {
        let resolved = snapshot(3, "name", json!("museum"));
        let source = Deferred::output(0, NodeId(3), "name", false).as_string();

        let f = |s: String| s.to_uppercase();
        let g = |s: String| format!("arn:aws:s3:::{s}");

        let chained = source.map(f).map(g);
        let fused = source.map(move |s| g(f(s)));

        assert_eq!(
            chained.resolve(&resolved).unwrap(),
            fused.resolve(&resolved).unwrap()
        );
        assert_eq!(chained.dependencies(), fused.dependencies());
    }

    #[test]
    fn test_transform_runs_once_per_upstream_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let shared = Deferred::output(0, NodeId(0), "id", false).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v
        });
        let consumer_a = shared.map(|v| v.to_string());
        let consumer_b = shared.map(|v| v.is_string());

        let mut resolved = snapshot(0, "id", json!("AKIA123"));
        consumer_a.resolve(&resolved).unwrap();
        consumer_b.resolve(&resolved).unwrap();
        shared.resolve(&resolved).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Realizing an unrelated node keeps the cached result
        resolved.insert(NodeId(9), Attributes::new());
        consumer_a.resolve(&resolved).unwrap();
        consumer_b.resolve(&resolved).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Re-inserting the upstream node runs it again
        let mut attrs = Attributes::new();
        attrs.insert("id".into(), json!("AKIA456"));
        resolved.insert(NodeId(0), attrs);
        assert_eq!(consumer_a.resolve(&resolved).unwrap(), "\"AKIA456\"");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unresolved_failure_is_retried_once_upstream_lands() {
        let id = Deferred::output(0, NodeId(4), "id", false).as_string();
        let mut resolved = Resolved::new();
        assert!(id.resolve(&resolved).is_err());

        let mut attrs = Attributes::new();
        attrs.insert("id".into(), json!("sa-1"));
        resolved.insert(NodeId(4), attrs);
        assert_eq!(id.resolve(&resolved).unwrap(), "sa-1");
    }

    #[test]
    fn test_try_map_failure_is_propagation_error() {
        let resolved = snapshot(1, "port", json!("http"));
        let port = Deferred::output(0, NodeId(1), "port", false)
            .try_map(|v| v.as_u64().ok_or("port is not numeric"));
        let err = port.resolve(&resolved).unwrap_err();
        assert_eq!(err, Error::Propagation("port is not numeric".into()));

        // Downstream consumers see the same failure, not a partial value
        let doubled = port.map(|p| p * 2);
        assert!(doubled.resolve(&resolved).unwrap_err().is_propagation());
    }

    #[test]
    fn test_zip_and_all_union_dependencies_and_secrecy() {
        let id = Deferred::output(0, NodeId(0), "id", false).as_string();
        let secret = Deferred::output(0, NodeId(0), "secret", true).as_string();
        let name = Deferred::output(0, NodeId(1), "name", false).as_string();

        let pair = id.zip(&secret);
        assert!(pair.is_secret());
        assert_eq!(pair.dependencies().len(), 2);

        let joined = Deferred::all(vec![id.clone(), name.clone()]).map(|parts| parts.join("/"));
        assert!(!joined.is_secret());
        assert_eq!(
            joined.depends_on(),
            BTreeSet::from([NodeId(0), NodeId(1)])
        );

        let mut resolved = snapshot(0, "id", json!("key-id"));
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!("user"));
        resolved.insert(NodeId(1), attrs);
        assert_eq!(joined.resolve(&resolved).unwrap(), "key-id/user");
    }

    #[test]
    fn test_secret_marking_sticks_through_transforms() {
        let password = Deferred::known("hunter2".to_string()).secret();
        assert!(password.is_secret());
        assert!(password.map(|p| p.len()).is_secret());
        assert!(password.to_value().is_secret());
    }
}
