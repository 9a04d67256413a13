//! ChartMuseum chart repository deployed onto a cluster

use super::metadata_name;
use super::storage::{self, CloudKind, SecretTarget, StorageBackend};
use crate::kinds::kubernetes;
use crate::kube::{
    Container, ContainerPort, DeploymentSpec, DeploymentStrategy, EmptyDirVolumeSource, EnvVar,
    HttpGetAction, IntOrString, LabelSelector, Labels, ObjectMeta, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, ServicePort, ServiceSpec, Volume, validate_dns_label,
};
use declarative::{
    Component, Composition, DeclareOptions, Deferred, Error, Inputs, NodeHandle, ProviderRef,
    Result, Scope,
};

const IMAGE: &str = "chartmuseum/chartmuseum:v0.12.0";
const PORT_NAME: &str = "http";
const CONTAINER_PORT: u16 = 8080;
const SERVICE_TYPES: [&str; 3] = ["ClusterIP", "NodePort", "LoadBalancer"];

/// Settings for a ChartMuseum instance
#[derive(Debug, Clone)]
pub struct ChartMuseumArgs {
    /// Namespace to deploy into (`chartmuseum` when unset)
    pub namespace: Option<String>,
    /// Replica count (1 when unset)
    pub replicas: Option<u32>,
    /// Enable the chart upload API
    pub api: Option<bool>,
    /// Enable the Prometheus metrics endpoint
    pub metrics: Option<bool>,
    /// Service type (`ClusterIP` when unset)
    pub service_type: Option<String>,
    /// Cluster to deploy onto
    pub provider: ProviderRef,
    pub cloud: CloudKind,
    pub region: String,
}

impl ChartMuseumArgs {
    /// Defaults for everything but the target cluster and storage location
    pub fn new(provider: ProviderRef, cloud: CloudKind, region: impl Into<String>) -> Self {
        Self {
            namespace: None,
            replicas: None,
            api: None,
            metrics: None,
            service_type: None,
            provider,
            cloud,
            region: region.into(),
        }
    }
}

/// Public outputs of a ChartMuseum instance
#[derive(Debug, Clone)]
pub struct ChartMuseumOutputs {
    /// Cluster the instance runs on
    pub provider: ProviderRef,
    pub namespace: Deferred<String>,
    pub service_name: Deferred<String>,
    pub bucket: Deferred<String>,
    /// `STORAGE*` variables handed to the container
    pub storage_env: Deferred<Vec<(String, String)>>,
}

/// A deployed ChartMuseum with its storage backend
#[derive(Debug, Clone)]
pub struct ChartMuseum {
    handle: NodeHandle,
    outputs: ChartMuseumOutputs,
}

impl Component for ChartMuseum {
    const TYPE: &'static str = "managedcluster:chartmuseum";
    type Outputs = ChartMuseumOutputs;

    fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    fn outputs(&self) -> &ChartMuseumOutputs {
        &self.outputs
    }
}

/// Value for a `DISABLE_*` variable
///
/// Features are off unless explicitly enabled.
pub fn disable_flag(enabled: Option<bool>) -> &'static str {
    if enabled == Some(true) { "false" } else { "true" }
}

impl ChartMuseum {
    /// Declare the instance
    ///
    /// Nothing is left in the composition if any part fails.
    pub fn new(
        comp: &mut Composition,
        name: &str,
        args: &ChartMuseumArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        comp.atomically(|comp| Self::build(comp, name, args, opts))
    }

    fn build(
        comp: &mut Composition,
        name: &str,
        args: &ChartMuseumArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        let scope = Scope::open::<Self>(comp, name, format!("chartmuseum-{name}"), opts)?;

        let namespace_name = args.namespace.as_deref().unwrap_or("chartmuseum");
        validate_dns_label("namespace", namespace_name)?;

        let labels = Labels::from([
            ("app".to_string(), "chartmuseum".to_string()),
            ("release".to_string(), name.to_string()),
        ]);

        let namespace = comp.declare(
            kubernetes::NAMESPACE,
            &scope.name("namespace"),
            scope.child().provider(&args.provider),
            Inputs::new().set(
                "metadata",
                serde_json::to_value(ObjectMeta {
                    name: Some(namespace_name.to_string()),
                    namespace: None,
                    labels: labels.clone(),
                })
                .map_err(|e| Error::Configuration(e.to_string()))?,
            ),
        )?;
        let ns_name = metadata_name(&namespace);

        let backend = storage::provision(
            comp,
            &scope,
            args.cloud,
            &args.region,
            SecretTarget {
                namespace: &namespace,
                namespace_name: &ns_name,
                provider: &args.provider,
                labels: &labels,
            },
        )?;

        // Provider is inherited from the namespace
        let spec = deployment_spec(name, args, &labels, &backend);
        let deployment_labels = labels.clone();
        comp.declare(
            kubernetes::DEPLOYMENT,
            &scope.name("deployment"),
            DeclareOptions::new().parent(&namespace),
            Inputs::new()
                .set(
                    "metadata",
                    ns_name
                        .map(move |ns| ObjectMeta::namespaced(ns, &deployment_labels))
                        .to_value(),
                )
                .set("spec", spec.to_value()),
        )?;

        let service_type = args.service_type.as_deref().unwrap_or("ClusterIP");
        if !SERVICE_TYPES.contains(&service_type) {
            return Err(Error::Configuration(format!(
                "unsupported service type '{service_type}' (expected one of: {})",
                SERVICE_TYPES.join(", ")
            )));
        }
        let service_labels = labels.clone();
        let service = comp.declare(
            kubernetes::SERVICE,
            &scope.name("service"),
            DeclareOptions::new()
                .parent(&namespace)
                .provider(&args.provider),
            Inputs::new()
                .set(
                    "metadata",
                    ns_name
                        .map(move |ns| ObjectMeta::namespaced(ns, &service_labels))
                        .to_value(),
                )
                .set(
                    "spec",
                    serde_json::to_value(ServiceSpec {
                        type_: service_type.to_string(),
                        ports: vec![ServicePort {
                            port: 80,
                            target_port: IntOrString::String(PORT_NAME.to_string()),
                            protocol: "TCP".to_string(),
                            name: PORT_NAME.to_string(),
                        }],
                        selector: labels,
                    })
                    .map_err(|e| Error::Configuration(e.to_string()))?,
                ),
        )?;

        log::debug!(
            "chartmuseum '{}' declared on {} storage in {}",
            name,
            backend.cloud.storage_family(),
            backend.region
        );

        Ok(Self {
            handle: scope.handle().clone(),
            outputs: ChartMuseumOutputs {
                provider: args.provider.clone(),
                namespace: ns_name,
                service_name: metadata_name(&service),
                bucket: backend.bucket.clone(),
                storage_env: backend.env(),
            },
        })
    }
}

fn health_probe() -> Probe {
    Probe {
        http_get: HttpGetAction {
            path: "/health".to_string(),
            port: IntOrString::String(PORT_NAME.to_string()),
        },
        failure_threshold: 3,
        initial_delay_seconds: 5,
        period_seconds: 10,
        success_threshold: 1,
        timeout_seconds: 1,
    }
}

/// Deployment spec, built once the bucket and secret names resolve
fn deployment_spec(
    name: &str,
    args: &ChartMuseumArgs,
    labels: &Labels,
    backend: &StorageBackend,
) -> Deferred<DeploymentSpec> {
    let name = name.to_string();
    let labels = labels.clone();
    let replicas = args.replicas.unwrap_or(1);
    let api = disable_flag(args.api);
    let metrics = disable_flag(args.metrics);
    let storage = backend.clone();

    backend
        .bucket
        .zip(&backend.secret_name)
        .map(move |(bucket, secret_name)| {
            let mut env = vec![
                EnvVar::value("DISABLE_API", api),
                EnvVar::value("DISABLE_METRICS", metrics),
                EnvVar::value("LOG_JSON", "true"),
                EnvVar::value("PROV_POST_FORM_FIELD_NAME", "prov"),
            ];
            env.extend(storage.container_env(bucket, &secret_name));

            let mut volumes = vec![Volume {
                name: "storage-volume".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                secret: None,
            }];
            volumes.extend(storage.volumes(&secret_name));

            DeploymentSpec {
                selector: LabelSelector {
                    match_labels: labels.clone(),
                },
                replicas,
                strategy: DeploymentStrategy::zero_unavailable(),
                template: PodTemplateSpec {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: None,
                        labels: labels.clone(),
                    },
                    spec: PodSpec {
                        security_context: Some(PodSecurityContext { fs_group: 1000 }),
                        containers: vec![Container {
                            name: "chartmuseum".to_string(),
                            image: IMAGE.to_string(),
                            image_pull_policy: "IfNotPresent".to_string(),
                            env,
                            args: vec![format!("--port={CONTAINER_PORT}")],
                            ports: vec![ContainerPort {
                                name: PORT_NAME.to_string(),
                                container_port: CONTAINER_PORT,
                            }],
                            liveness_probe: Some(health_probe()),
                            readiness_probe: Some(health_probe()),
                            volume_mounts: storage.volume_mounts(),
                        }],
                        volumes,
                    },
                },
            }
        })
}
