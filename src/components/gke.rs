//! Managed GKE cluster
//!
//! GKE has no ready-made kubeconfig output, so one is interpolated from the
//! cluster name, endpoint and CA certificate once they resolve. Authentication
//! goes through the gcloud credential helper.

use super::{ClusterOutputs, declare_provider};
use crate::kinds::gcp;
use declarative::{
    Component, Composition, DeclareOptions, Deferred, Error, Inputs, NodeHandle, Result, Scope,
};
use serde_json::{Value, json};

/// Settings for a managed GKE cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GkeClusterArgs {
    pub project: String,
    pub zone: String,
    pub node_count: u32,
    pub machine_type: String,
    /// Pinned master version; the engine default when unset
    pub min_master_version: Option<String>,
}

impl Default for GkeClusterArgs {
    fn default() -> Self {
        Self {
            project: String::new(),
            zone: "us-west1-a".to_string(),
            node_count: 2,
            machine_type: "n1-standard-1".to_string(),
            min_master_version: None,
        }
    }
}

const OAUTH_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/compute",
    "https://www.googleapis.com/auth/devstorage.read_only",
    "https://www.googleapis.com/auth/logging.write",
    "https://www.googleapis.com/auth/monitoring",
];

/// Render a kubeconfig for a GKE cluster
pub fn render_kubeconfig(context: &str, endpoint: &str, ca_certificate: &str) -> String {
    format!(
        "apiVersion: v1
clusters:
- cluster:
    certificate-authority-data: {ca_certificate}
    server: https://{endpoint}
  name: {context}
contexts:
- context:
    cluster: {context}
    user: {context}
  name: {context}
current-context: {context}
kind: Config
preferences: {{}}
users:
- name: {context}
  user:
    auth-provider:
      config:
        cmd-args: config config-helper --format=json
        cmd-path: gcloud
        expiry-key: '{{.credential.token_expiry}}'
        token-key: '{{.credential.access_token}}'
      name: gcp
"
    )
}

/// A GKE cluster and a Kubernetes provider targeting it
#[derive(Debug, Clone)]
pub struct ManagedGkeCluster {
    handle: NodeHandle,
    outputs: ClusterOutputs,
}

impl Component for ManagedGkeCluster {
    const TYPE: &'static str = "examples:managed:GkeCluster";
    type Outputs = ClusterOutputs;

    fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    fn outputs(&self) -> &ClusterOutputs {
        &self.outputs
    }
}

impl ManagedGkeCluster {
    pub fn new(
        comp: &mut Composition,
        name: &str,
        args: &GkeClusterArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        if args.project.is_empty() {
            return Err(Error::Configuration(format!(
                "GKE cluster '{name}' needs a gcp project"
            )));
        }

        comp.atomically(|comp| {
            let scope = Scope::open::<Self>(comp, name, name, opts)?;

            let cluster = scope.declare(
                comp,
                gcp::GKE_CLUSTER,
                "cluster",
                Inputs::new()
                    .set("project", args.project.as_str())
                    .set("location", args.zone.as_str())
                    .set("initialNodeCount", args.node_count)
                    .set_opt("minMasterVersion", args.min_master_version.as_deref())
                    .set_opt("nodeVersion", args.min_master_version.as_deref())
                    .set(
                        "nodeConfig",
                        json!({ "machineType": args.machine_type, "oauthScopes": OAUTH_SCOPES }),
                    ),
            )?;

            let prefix = format!("{}_{}", args.project, args.zone);
            let ca_certificate = cluster.output("masterAuth").try_map(|auth| {
                auth.get("clusterCaCertificate")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or("masterAuth has no clusterCaCertificate")
            });
            let kubeconfig = Deferred::all([
                cluster.output_string("name"),
                cluster.output_string("endpoint"),
                ca_certificate,
            ])
            .try_map(move |parts| match parts.as_slice() {
                [cluster_name, endpoint, ca] => Ok(render_kubeconfig(
                    &format!("{prefix}_{cluster_name}"),
                    endpoint,
                    ca,
                )),
                _ => Err("incomplete cluster attributes"),
            })
            .secret();

            let provider = declare_provider(comp, &scope, "gke", &kubeconfig)?;

            Ok(Self {
                handle: scope.handle().clone(),
                outputs: ClusterOutputs {
                    provider,
                    kubeconfig,
                },
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PreviewEngine;
    use declarative::{ConvergeOptions, converge_all};

    fn args() -> GkeClusterArgs {
        GkeClusterArgs {
            project: "demo-project".into(),
            ..GkeClusterArgs::default()
        }
    }

    #[test]
    fn test_kubeconfig_template() {
        let config = render_kubeconfig("p_z_c", "10.0.0.1", "Q0E=");
        assert!(config.contains("server: https://10.0.0.1"));
        assert!(config.contains("certificate-authority-data: Q0E="));
        assert!(config.contains("current-context: p_z_c"));
        assert!(config.contains("token-key: '{.credential.access_token}'"));
        assert!(config.contains("preferences: {}"));
    }

    #[test]
    fn test_kubeconfig_interpolated_after_convergence() {
        let mut comp = Composition::new("demo");
        let gke = ManagedGkeCluster::new(&mut comp, "gke-demo", &args(), DeclareOptions::new())
            .unwrap();
        assert!(gke.outputs().kubeconfig.is_secret());

        let run = converge_all(&comp, &PreviewEngine::new(), &ConvergeOptions::default()).unwrap();
        assert!(run.is_success());
        let kubeconfig = gke.outputs().kubeconfig.resolve(&run.resolved).unwrap();
        assert!(kubeconfig.contains("current-context: demo-project_us-west1-a_gke-demo-cluster-"));
    }

    #[test]
    fn test_missing_project_rejected() {
        let mut comp = Composition::new("demo");
        let err = ManagedGkeCluster::new(
            &mut comp,
            "gke",
            &GkeClusterArgs::default(),
            DeclareOptions::new(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(comp.is_empty());
    }
}
