//! One managed cluster on each cloud

use super::{
    AksClusterArgs, ClusterOutputs, EksClusterArgs, GkeClusterArgs, ManagedAksCluster,
    ManagedEksCluster, ManagedGkeCluster,
};
use declarative::{Component, Composition, DeclareOptions, NodeHandle, Result, Scope};

/// Per-cloud settings for the multi-cloud cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiCloudArgs {
    pub gke: GkeClusterArgs,
    pub aks: AksClusterArgs,
    pub eks: EksClusterArgs,
}

/// GKE, AKS and EKS clusters exposed as one list of targets
#[derive(Debug, Clone)]
pub struct ManagedMultiCloudCluster {
    handle: NodeHandle,
    clusters: Vec<ClusterOutputs>,
}

impl Component for ManagedMultiCloudCluster {
    const TYPE: &'static str = "examples:managed:MultiCloudCluster";
    type Outputs = Vec<ClusterOutputs>;

    fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    fn outputs(&self) -> &Vec<ClusterOutputs> {
        &self.clusters
    }
}

impl ManagedMultiCloudCluster {
    /// Target names, in the order the clusters are declared
    pub const TARGETS: [&'static str; 3] =
        ["gke-demo-cluster", "aks-demo-cluster", "eks-demo-cluster"];

    /// Declare every cluster
    ///
    /// A failing target is reported by name and nothing is declared.
    pub fn new(comp: &mut Composition, name: &str, args: &MultiCloudArgs) -> Result<Self> {
        comp.atomically(|comp| {
            let scope = Scope::open::<Self>(comp, name, "", DeclareOptions::new())?;
            let [gke, aks, eks] = Self::TARGETS;

            let mut clusters = Vec::with_capacity(Self::TARGETS.len());
            clusters.push(
                ManagedGkeCluster::new(comp, gke, &args.gke, scope.child())
                    .map_err(|e| e.in_target(gke))?
                    .outputs()
                    .clone(),
            );
            clusters.push(
                ManagedAksCluster::new(comp, aks, &args.aks, scope.child())
                    .map_err(|e| e.in_target(aks))?
                    .outputs()
                    .clone(),
            );
            clusters.push(
                ManagedEksCluster::new(comp, eks, &args.eks, scope.child())
                    .map_err(|e| e.in_target(eks))?
                    .outputs()
                    .clone(),
            );

            log::debug!("multi-cloud '{}' declared {} targets", name, clusters.len());
            Ok(Self {
                handle: scope.handle().clone(),
                clusters,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::kubernetes;
    use declarative::Error;

    fn args() -> MultiCloudArgs {
        let mut args = MultiCloudArgs::default();
        args.gke.project = "demo-project".into();
        args
    }

    #[test]
    fn test_three_targets_in_declaration_order() {
        let mut comp = Composition::new("demo");
        let multi = ManagedMultiCloudCluster::new(&mut comp, "demo", &args()).unwrap();

        let clusters = multi.outputs();
        assert_eq!(clusters.len(), 3);
        let owners: Vec<String> = clusters
            .iter()
            .map(|c| {
                let provider = comp.node(c.provider.node()).unwrap();
                assert_eq!(provider.kind, kubernetes::PROVIDER);
                let owner = provider.parent.unwrap();
                comp.node(owner).unwrap().identity.clone()
            })
            .collect();
        assert_eq!(owners, ManagedMultiCloudCluster::TARGETS);

        let ids: Vec<_> = clusters.iter().map(|c| c.provider.node()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_failing_target_is_named() {
        let mut comp = Composition::new("demo");
        let err = ManagedMultiCloudCluster::new(&mut comp, "demo", &MultiCloudArgs::default())
            .unwrap_err();

        match &err {
            Error::Target { target, source } => {
                assert_eq!(target, "gke-demo-cluster");
                assert!(source.is_configuration());
            }
            other => panic!("expected a target error, got {other:?}"),
        }
        assert!(err.is_configuration());
        assert!(comp.is_empty());
    }
}
