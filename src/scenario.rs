//! Stack scenarios
//!
//! Each scenario builds one demo composition from the stack config and names
//! the values it exports.

use crate::components::{
    AksClusterArgs, ChartMuseum, ChartMuseumArgs, EksClusterArgs, GkeClusterArgs,
    ManagedAksCluster, ManagedEksCluster, ManagedGkeCluster, ManagedMultiCloudCluster,
    MultiCloudArgs, metadata_name,
};
use crate::config::StackConfig;
use crate::kinds::kubernetes;
use crate::kube::ObjectMeta;
use clap::ValueEnum;
use declarative::{
    Attributes, Component, Composition, DeclareOptions, Deferred, Error, Inputs, Resolved, Result,
};
use serde_json::Value;

/// Placeholder shown instead of a secret output
pub const SECRET_MASK: &str = "[secret]";

/// The demo stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Managed AKS cluster
    Aks,
    /// Managed GKE cluster
    Gke,
    /// Managed EKS cluster
    Eks,
    /// A cluster on every cloud, each with a project namespace
    MultiCloud,
    /// EKS cluster running ChartMuseum
    Chartmuseum,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Aks,
        Scenario::Gke,
        Scenario::Eks,
        Scenario::MultiCloud,
        Scenario::Chartmuseum,
    ];

    /// Name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Aks => "aks",
            Scenario::Gke => "gke",
            Scenario::Eks => "eks",
            Scenario::MultiCloud => "multi-cloud",
            Scenario::Chartmuseum => "chartmuseum",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Aks => "Managed AKS cluster with its AD service principal",
            Scenario::Gke => "Managed GKE cluster",
            Scenario::Eks => "Managed EKS cluster in its own VPC",
            Scenario::MultiCloud => "GKE, AKS and EKS clusters, each with a project namespace",
            Scenario::Chartmuseum => "EKS cluster running ChartMuseum with cloud storage",
        }
    }
}

/// A built composition and its exported values
pub struct Stack {
    pub scenario: Scenario,
    pub composition: Composition,
    pub outputs: Vec<(String, Deferred<Value>)>,
}

impl Stack {
    fn new(scenario: Scenario, composition: Composition) -> Self {
        Self {
            scenario,
            composition,
            outputs: Vec::new(),
        }
    }

    fn export(&mut self, name: &str, value: Deferred<Value>) {
        self.outputs.push((name.to_string(), value));
    }

    /// Resolve one output, masking secrets unless asked not to
    pub fn render_output(
        value: &Deferred<Value>,
        resolved: &Resolved,
        show_secrets: bool,
    ) -> Result<Value> {
        let rendered = value.resolve(resolved)?;
        if value.is_secret() && !show_secrets {
            return Ok(Value::String(SECRET_MASK.to_string()));
        }
        Ok(rendered)
    }

    /// Resolve every output that can be resolved
    ///
    /// Outputs waiting on nodes that were not realized are left out.
    pub fn resolve_outputs(&self, resolved: &Resolved, show_secrets: bool) -> Attributes {
        let mut out = Attributes::new();
        for (name, value) in &self.outputs {
            match Self::render_output(value, resolved, show_secrets) {
                Ok(v) => {
                    out.insert(name.clone(), v);
                }
                Err(e) => log::warn!("Output '{name}' is unavailable: {e}"),
            }
        }
        out
    }
}

fn gke_args(config: &StackConfig) -> GkeClusterArgs {
    GkeClusterArgs {
        project: config.gcp.project.clone().unwrap_or_default(),
        zone: config.gcp.zone.clone(),
        ..GkeClusterArgs::default()
    }
}

fn aks_args(config: &StackConfig) -> AksClusterArgs {
    AksClusterArgs {
        location: config.azure.location.clone(),
        ..AksClusterArgs::default()
    }
}

/// Build a scenario's composition
pub fn build(scenario: Scenario, config: &StackConfig) -> Result<Stack> {
    config.validate()?;
    config.require_for(scenario)?;

    let project = config.project.as_str();
    let mut stack = Stack::new(scenario, Composition::new(project));
    let comp = &mut stack.composition;

    match scenario {
        Scenario::Aks => {
            let cluster =
                ManagedAksCluster::new(comp, project, &aks_args(config), DeclareOptions::new())?;
            let kubeconfig = cluster.outputs().kubeconfig.to_value();
            stack.export("aksKubeConfig", kubeconfig);
        }
        Scenario::Gke => {
            let cluster =
                ManagedGkeCluster::new(comp, project, &gke_args(config), DeclareOptions::new())?;
            let kubeconfig = cluster.outputs().kubeconfig.to_value();
            stack.export("gkeKubeConfig", kubeconfig);
        }
        Scenario::Eks => {
            let cluster = ManagedEksCluster::new(
                comp,
                project,
                &EksClusterArgs::default(),
                DeclareOptions::new(),
            )?;
            let kubeconfig = cluster.outputs().kubeconfig.to_value();
            stack.export("eksKubeConfig", kubeconfig);
        }
        Scenario::MultiCloud => {
            let args = MultiCloudArgs {
                gke: gke_args(config),
                aks: aks_args(config),
                eks: EksClusterArgs::default(),
            };
            let multi = ManagedMultiCloudCluster::new(comp, project, &args)?;

            let metadata = serde_json::to_value(ObjectMeta {
                name: Some(project.to_string()),
                namespace: None,
                labels: Default::default(),
            })
            .map_err(|e| Error::Configuration(e.to_string()))?;

            let mut namespaces = Vec::new();
            for (i, cluster) in multi.outputs().iter().enumerate() {
                let ns = comp.declare(
                    kubernetes::NAMESPACE,
                    &format!("{project}-namespace-{i}"),
                    DeclareOptions::new().provider(&cluster.provider),
                    Inputs::new().set("metadata", metadata.clone()),
                )?;
                namespaces.push(metadata_name(&ns));
            }

            let clusters = Deferred::all(multi.outputs().iter().map(|c| {
                let target = c.provider.identity().to_string();
                c.kubeconfig.map(move |kubeconfig| {
                    serde_json::json!({ "provider": target, "kubeconfig": kubeconfig })
                })
            }));
            stack.export("clusters", clusters.to_value());
            stack.export("namespaces", Deferred::all(namespaces).to_value());
        }
        Scenario::Chartmuseum => {
            let cloud = config.chartmuseum_cloud()?;
            let region = config
                .chartmuseum_region()
                .ok_or_else(|| Error::MissingInput {
                    input: "chartmuseum.region".into(),
                    owner: format!("scenario '{}'", scenario.name()),
                })?
                .to_string();

            let eks = ManagedEksCluster::new(
                comp,
                &format!("{project}-eks"),
                &EksClusterArgs::default(),
                DeclareOptions::new(),
            )?;

            let settings = &config.chartmuseum;
            let args = ChartMuseumArgs {
                namespace: settings.namespace.clone(),
                replicas: settings.replicas,
                api: settings.api,
                metrics: settings.metrics,
                service_type: settings.service_type.clone(),
                ..ChartMuseumArgs::new(eks.outputs().provider.clone(), cloud, region)
            };
            let museum = ChartMuseum::new(comp, project, &args, DeclareOptions::new())?;
            let outputs = museum.outputs().clone();

            stack.export("eksKubeConfig", eks.outputs().kubeconfig.to_value());
            stack.export("chartmuseumNamespace", outputs.namespace.to_value());
            stack.export("chartmuseumService", outputs.service_name.to_value());
            stack.export("chartmuseumBucket", outputs.bucket.to_value());
            stack.export(
                "chartmuseumStorage",
                outputs.storage_env.map(|env| {
                    Value::Object(env.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
                }),
            );
        }
    }

    log::info!(
        "Built scenario '{}' with {} declarations",
        scenario.name(),
        stack.composition.len()
    );
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PreviewEngine;
    use declarative::{ConvergeOptions, converge_all};

    fn config() -> StackConfig {
        let mut config = StackConfig::default();
        config.project = "demo".into();
        config.gcp.project = Some("acme-dev".into());
        config
    }

    fn up(stack: &Stack) -> declarative::Convergence {
        converge_all(
            &stack.composition,
            &PreviewEngine::new(),
            &ConvergeOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_every_scenario_builds_and_converges() {
        for scenario in Scenario::ALL {
            let stack = build(scenario, &config()).unwrap();
            let run = up(&stack);
            assert!(run.summary.is_success(), "{}: {:?}", scenario.name(), run.summary);

            let outputs = stack.resolve_outputs(&run.resolved, true);
            assert_eq!(outputs.len(), stack.outputs.len(), "{}", scenario.name());
        }
    }

    #[test]
    fn test_names_match_value_enum() {
        for scenario in Scenario::ALL {
            let parsed = Scenario::from_str(scenario.name(), false).unwrap();
            assert_eq!(parsed, scenario);
        }
    }

    #[test]
    fn test_missing_gcp_project_is_reported() {
        let mut config = config();
        config.gcp.project = None;

        let err = build(Scenario::MultiCloud, &config).err().unwrap();
        assert!(matches!(err, Error::MissingInput { ref input, .. } if input == "gcp.project"));
        assert!(build(Scenario::Eks, &config).is_ok());
    }

    #[test]
    fn test_unknown_storage_cloud_is_rejected() {
        let mut config = config();
        config.chartmuseum.cloud = "digitalocean".into();
        let err = build(Scenario::Chartmuseum, &config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_multi_cloud_namespaces_target_each_cluster() {
        let stack = build(Scenario::MultiCloud, &config()).unwrap();
        let comp = &stack.composition;

        let namespaces: Vec<_> = comp
            .nodes()
            .iter()
            .filter(|n| n.kind == kubernetes::NAMESPACE)
            .collect();
        assert_eq!(namespaces.len(), 3);
        for (i, ns) in namespaces.iter().enumerate() {
            assert_eq!(ns.identity, format!("demo-namespace-{i}"));
            assert!(ns.parent.is_none());
            assert!(ns.provider.is_some());
        }

        let run = up(&stack);
        let outputs = stack.resolve_outputs(&run.resolved, false);
        assert_eq!(outputs["namespaces"], serde_json::json!(["demo", "demo", "demo"]));
    }

    #[test]
    fn test_amazon_chartmuseum_outputs() {
        let stack = build(Scenario::Chartmuseum, &config()).unwrap();
        let run = up(&stack);
        let outputs = stack.resolve_outputs(&run.resolved, false);

        let bucket = outputs["chartmuseumBucket"].as_str().unwrap().to_string();
        assert!(bucket.starts_with("chartmuseum-demo-bucket-"));

        let storage = &outputs["chartmuseumStorage"];
        assert_eq!(storage["STORAGE"], "amazon");
        assert_eq!(storage["STORAGE_AMAZON_REGION"], "us-west-2");
        assert_eq!(storage["STORAGE_AMAZON_BUCKET"], bucket.as_str());
        assert_eq!(outputs["chartmuseumNamespace"], "chartmuseum");
    }

    #[test]
    fn test_secret_outputs_are_masked() {
        let stack = build(Scenario::Gke, &config()).unwrap();
        let run = up(&stack);

        let masked = stack.resolve_outputs(&run.resolved, false);
        assert_eq!(masked["gkeKubeConfig"], SECRET_MASK);

        let shown = stack.resolve_outputs(&run.resolved, true);
        assert!(shown["gkeKubeConfig"].as_str().unwrap().contains("current-context"));
    }
}
