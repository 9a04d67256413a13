//! Composite resource groups
//!
//! Each group declares the resources for one logical unit and exposes a small
//! public output struct. Managed clusters on every cloud share
//! [`ClusterOutputs`], so callers can treat them uniformly.

pub mod aks;
pub mod chartmuseum;
pub mod eks;
pub mod gke;
pub mod multicloud;
pub mod storage;

use crate::kinds::kubernetes;
use declarative::{Composition, Deferred, Inputs, NodeHandle, ProviderRef, Result, Scope};
use serde_json::Value;

pub use aks::{AksClusterArgs, ManagedAksCluster};
pub use chartmuseum::{ChartMuseum, ChartMuseumArgs, ChartMuseumOutputs};
pub use eks::{EksClusterArgs, ManagedEksCluster};
pub use gke::{GkeClusterArgs, ManagedGkeCluster};
pub use multicloud::{ManagedMultiCloudCluster, MultiCloudArgs};
pub use storage::CloudKind;

/// Public outputs of a managed Kubernetes cluster
#[derive(Debug, Clone)]
pub struct ClusterOutputs {
    /// Kubernetes provider targeting the cluster
    pub provider: ProviderRef,
    /// Kubeconfig for the cluster
    pub kubeconfig: Deferred<String>,
}

/// Declare a Kubernetes provider for a cluster's kubeconfig
pub(crate) fn declare_provider(
    comp: &mut Composition,
    scope: &Scope,
    suffix: &str,
    kubeconfig: &Deferred<String>,
) -> Result<ProviderRef> {
    let provider = scope.declare(
        comp,
        kubernetes::PROVIDER,
        suffix,
        Inputs::new().set("kubeconfig", kubeconfig.clone()),
    )?;
    Ok(provider.as_provider())
}

/// Deferred `metadata.name` of a Kubernetes object
pub fn metadata_name(object: &NodeHandle) -> Deferred<String> {
    object.output("metadata").try_map(|metadata| {
        metadata
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or("object metadata has no name")
    })
}
