//! Declaration summaries for previews

use crate::composition::Composition;
use crate::resource::ResourceNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A flattened view of one declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    /// Identity of the node
    pub identity: String,
    /// Type token of the node
    pub kind: String,
    /// Slash-separated ownership path
    pub path: String,
    /// Nesting depth below the root
    pub depth: usize,
    /// Identity of the provider node, if any
    pub provider: Option<String>,
    /// Input names whose values are deferred references
    pub deferred_inputs: Vec<String>,
    /// Input names known at declaration time
    pub literal_inputs: Vec<String>,
    /// Whether the node is a component
    pub component: bool,
}

impl Declaration {
    /// Build the view for a node
    pub fn from_node(comp: &Composition, node: &ResourceNode) -> Self {
        let (deferred_inputs, literal_inputs): (Vec<_>, Vec<_>) =
            node.inputs.iter().partition(|(_, input)| input.is_deferred());
        let path = comp.path(node.id);
        Self {
            identity: node.identity.clone(),
            kind: node.kind.clone(),
            depth: path.matches('/').count(),
            path,
            provider: node.provider.as_ref().map(|p| p.identity().to_string()),
            deferred_inputs: deferred_inputs.into_iter().map(|(n, _)| n.clone()).collect(),
            literal_inputs: literal_inputs.into_iter().map(|(n, _)| n.clone()).collect(),
            component: node.component,
        }
    }
}

/// Flatten every declaration of a composition, in declaration order
pub fn declarations(comp: &Composition) -> Vec<Declaration> {
    comp.nodes()
        .iter()
        .map(|n| Declaration::from_node(comp, n))
        .collect()
}

/// Declaration summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSummary {
    /// Number of backing resources
    pub resources: usize,
    /// Number of component nodes
    pub components: usize,
    /// Number of provider nodes
    pub providers: usize,
    /// Number of inputs that wait on another node
    pub deferred_inputs: usize,
}

impl DeclarationSummary {
    /// Create a summary from a composition
    pub fn from_composition(comp: &Composition) -> Self {
        let mut summary = Self::default();
        for node in comp.nodes() {
            if node.component {
                summary.components += 1;
            } else {
                summary.resources += 1;
            }
            if node.is_provider() {
                summary.providers += 1;
            }
            summary.deferred_inputs += node.inputs.deferred_count();
        }
        summary
    }

    /// Total number of declarations
    pub fn total(&self) -> usize {
        self.resources + self.components
    }
}

/// Group declarations by type token
pub fn group_by_type(decls: &[Declaration]) -> BTreeMap<String, Vec<&Declaration>> {
    let mut groups: BTreeMap<String, Vec<&Declaration>> = BTreeMap::new();
    for decl in decls {
        groups.entry(decl.kind.clone()).or_default().push(decl);
    }
    groups
}
