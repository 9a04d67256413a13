//! Composite groups
//!
//! A component is a named bundle of declarations that forms one logical unit
//! (a managed cluster, a deployed application). It owns its children through
//! parent ids and only exposes a fixed set of public outputs.

use crate::composition::Composition;
use crate::error::Result;
use crate::resource::{DeclareOptions, Inputs, NodeHandle};

/// A composite resource group
pub trait Component {
    /// Type token registered for the group node
    const TYPE: &'static str;

    /// The public surface of the group
    type Outputs;

    /// Node representing the group itself
    fn handle(&self) -> &NodeHandle;

    /// Public outputs; the only way to consume a group
    fn outputs(&self) -> &Self::Outputs;
}

/// Public outputs of any component
pub fn group_outputs<C: Component>(component: &C) -> &C::Outputs {
    component.outputs()
}

/// Naming and ownership helper used while building a component
///
/// Child identities are `<prefix>-<suffix>`, so two groups with different
/// names never collide even when their children share a parent.
#[derive(Debug, Clone)]
pub struct Scope {
    handle: NodeHandle,
    prefix: String,
}

impl Scope {
    /// Register the group node and start a scope for its children
    pub fn open<C: Component>(
        comp: &mut Composition,
        name: &str,
        prefix: impl Into<String>,
        opts: DeclareOptions,
    ) -> Result<Self> {
        let handle = comp.component(C::TYPE, name, opts)?;
        Ok(Self {
            handle,
            prefix: prefix.into(),
        })
    }

    /// Group node
    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    /// Identity for a child
    pub fn name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}-{}", self.prefix, suffix)
        }
    }

    /// Options for a direct child of the group
    pub fn child(&self) -> DeclareOptions {
        DeclareOptions::new().parent(&self.handle)
    }

    /// Declare a direct child named after the scope prefix
    pub fn declare(
        &self,
        comp: &mut Composition,
        kind: &str,
        suffix: &str,
        inputs: Inputs,
    ) -> Result<NodeHandle> {
        comp.declare(kind, &self.name(suffix), self.child(), inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;

    struct Pair {
        handle: NodeHandle,
        outputs: Deferred<String>,
    }

    impl Component for Pair {
        const TYPE: &'static str = "test:index:Pair";
        type Outputs = Deferred<String>;

        fn handle(&self) -> &NodeHandle {
            &self.handle
        }

        fn outputs(&self) -> &Self::Outputs {
            &self.outputs
        }
    }

    impl Pair {
        fn new(comp: &mut Composition, name: &str) -> Result<Self> {
            let scope = Scope::open::<Self>(comp, name, format!("pair-{name}"), DeclareOptions::new())?;
            let left = scope.declare(comp, "test:index:Left", "left", Inputs::new())?;
            scope.declare(
                comp,
                "test:index:Right",
                "right",
                Inputs::new().set("left", left.output("id")),
            )?;
            Ok(Self {
                handle: scope.handle().clone(),
                outputs: left.output_string("id"),
            })
        }
    }

    #[test]
    fn test_scope_prefixes_children() {
        let mut comp = Composition::new("demo");
        let pair = Pair::new(&mut comp, "one").unwrap();
        Pair::new(&mut comp, "two").unwrap();

        let children: Vec<&str> = comp
            .children(pair.handle().id())
            .map(|n| n.identity.as_str())
            .collect();
        assert_eq!(children, vec!["pair-one-left", "pair-one-right"]);
        assert_eq!(comp.node(pair.handle().id()).unwrap().kind, Pair::TYPE);
        assert!(!group_outputs(&pair).is_known());
    }
}
