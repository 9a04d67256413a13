//! Convergence planner - groups declarations into dependency waves

use crate::composition::Composition;
use crate::resource::ResourceNode;
use crate::types::NodeId;
use std::collections::BTreeSet;

/// A plan with nodes grouped into waves
///
/// Every node in a wave depends only on nodes in earlier waves, so a wave can
/// be realized in parallel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergencePlan {
    pub waves: Vec<Vec<NodeId>>,
}

impl ConvergencePlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan every node of a composition
    pub fn from_composition(comp: &Composition) -> Self {
        Self::for_nodes(comp, &comp.nodes().iter().map(|n| n.id).collect())
    }

    /// Plan a subset of nodes
    ///
    /// Dependencies outside the subset are assumed to be satisfied already.
    fn for_nodes(comp: &Composition, selected: &BTreeSet<NodeId>) -> Self {
        let mut level = vec![0usize; comp.len()];
        let mut waves: Vec<Vec<NodeId>> = Vec::new();

        // Declaration order is a topological order, one pass is enough.
        for node in comp.nodes() {
            if !selected.contains(&node.id) {
                continue;
            }
            let wave = node
                .dependencies()
                .iter()
                .filter(|d| selected.contains(d))
                .map(|d| level[d.index()] + 1)
                .max()
                .unwrap_or(0);
            level[node.id.index()] = wave;
            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            waves[wave].push(node.id);
        }

        Self { waves }
    }

    /// Restrict the plan to nodes matching a target pattern
    ///
    /// Target format: "type" or "type.name". Matching nodes keep everything
    /// they transitively depend on so their inputs can still resolve.
    pub fn filter_by_target(self, comp: &Composition, target: Option<&str>) -> Self {
        let Some(t) = target else {
            return self;
        };
        let (resource_type, name) = parse_target(t);
        let planned: BTreeSet<NodeId> = self.waves.iter().flatten().copied().collect();

        let mut selected = BTreeSet::new();
        let mut stack: Vec<NodeId> = comp
            .nodes()
            .iter()
            .filter(|n| planned.contains(&n.id))
            .filter(|n| matches_filter(n, resource_type.as_deref(), name.as_deref()))
            .map(|n| n.id)
            .collect();
        while let Some(id) = stack.pop() {
            if !selected.insert(id) {
                continue;
            }
            if let Some(node) = comp.node(id) {
                stack.extend(node.dependencies());
            }
        }
        log::debug!("target '{}' selects {} node(s)", t, selected.len());

        Self::for_nodes(comp, &selected)
    }

    /// Total number of nodes in the plan
    pub fn total_nodes(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(Vec::is_empty)
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a node matches the filter criteria
fn matches_filter(node: &ResourceNode, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "k8s" | "kubernetes" => node.kind.starts_with("kubernetes:"),
            "providers" => node.is_provider(),
            "components" => node.component,
            _ => node.kind == rt || node.kind.starts_with(rt) || kind_suffix(&node.kind) == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !node.identity.contains(n)
    {
        return false;
    }

    true
}

/// Last segment of a type token, lowercased: `aws:s3/bucket:Bucket` -> `bucket`
fn kind_suffix(kind: &str) -> String {
    kind.rsplit(':').next().unwrap_or(kind).to_lowercase()
}
