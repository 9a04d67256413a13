//! Kubernetes manifest types
//!
//! Only the fields the stacks set are modelled. Everything serializes with
//! Kubernetes' camelCase field names and is passed to the engine as JSON.

use declarative::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// Check that a name is a valid RFC 1123 DNS label (namespaces, ports, ...)
pub fn validate_dns_label(what: &str, name: &str) -> Result<(), Error> {
    if name.len() > 63 || !DNS_LABEL.is_match(name) {
        return Err(Error::Configuration(format!(
            "{what} '{name}' must be a lowercase RFC 1123 label of at most 63 characters"
        )));
    }
    Ok(())
}

/// Labels keyed by name
pub type Labels = BTreeMap<String, String>;

/// Object metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name; the engine auto-names when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

impl ObjectMeta {
    /// Metadata for a namespaced object
    pub fn namespaced(namespace: String, labels: &Labels) -> Self {
        Self {
            name: None,
            namespace: Some(namespace),
            labels: labels.clone(),
        }
    }
}

/// Integer or string field (ports, surge/unavailable counts)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

/// Label selector
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must match
    pub match_labels: Labels,
}

/// Deployment spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Label selector
    pub selector: LabelSelector,
    /// Number of replicas
    pub replicas: u32,
    /// Deployment strategy
    pub strategy: DeploymentStrategy,
    /// Pod template
    pub template: PodTemplateSpec,
}

/// Deployment strategy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategy {
    /// Strategy type: RollingUpdate or Recreate
    #[serde(rename = "type")]
    pub type_: String,
    /// Rolling update config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateConfig>,
}

impl DeploymentStrategy {
    /// Rolling update that never takes a replica down before its replacement is ready
    pub fn zero_unavailable() -> Self {
        Self {
            type_: "RollingUpdate".to_string(),
            rolling_update: Some(RollingUpdateConfig {
                max_unavailable: Some(IntOrString::Int(0)),
                max_surge: None,
            }),
        }
    }
}

/// Rolling update configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateConfig {
    /// Max unavailable pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,
    /// Max surge pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrString>,
}

/// Pod template spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    pub metadata: ObjectMeta,
    /// Pod spec
    pub spec: PodSpec,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Pod-level security settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,
    /// Containers
    pub containers: Vec<Container>,
    /// Volumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Pod security context
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    /// Group owning mounted volumes
    pub fs_group: u32,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Container image
    pub image: String,
    /// Image pull policy
    pub image_pull_policy: String,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Liveness probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,
    /// Readiness probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Literal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Value taken from another object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    /// Variable with a literal value
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }

    /// Variable read from a key of a secret
    pub fn from_secret(name: impl Into<String>, secret: &str, key: &str) -> Self {
        Self {
            name: name.into(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: SecretKeySelector {
                    name: secret.to_string(),
                    key: key.to_string(),
                },
            }),
        }
    }
}

/// Source of an environment variable
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    /// Secret key reference
    pub secret_key_ref: SecretKeySelector,
}

/// Reference to a key within a secret
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SecretKeySelector {
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name, referenced by probes and services
    pub name: String,
    /// Port number
    pub container_port: u16,
}

/// Health probe
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// HTTP GET probe
    pub http_get: HttpGetAction,
    /// Consecutive failures before the probe fails
    pub failure_threshold: u32,
    /// Initial delay seconds
    pub initial_delay_seconds: u32,
    /// Period seconds
    pub period_seconds: u32,
    /// Consecutive successes before the probe passes
    pub success_threshold: u32,
    /// Timeout seconds
    pub timeout_seconds: u32,
}

/// HTTP GET action
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpGetAction {
    /// Request path
    pub path: String,
    /// Port name or number
    pub port: IntOrString,
}

/// Volume
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Scratch space for the pod's lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
    /// Secret projected as files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
}

/// emptyDir volume source
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmptyDirVolumeSource {}

/// Secret volume source
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretVolumeSource {
    /// Secret name
    pub secret_name: String,
}

/// Volume mount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    /// Volume name
    pub name: String,
    /// Mount path
    pub mount_path: String,
    /// Mount read-only
    #[serde(default)]
    pub read_only: bool,
}

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Service type (ClusterIP, NodePort, LoadBalancer)
    #[serde(rename = "type")]
    pub type_: String,
    /// Ports
    pub ports: Vec<ServicePort>,
    /// Pod selector
    pub selector: Labels,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Exposed port
    pub port: u16,
    /// Container port name or number
    pub target_port: IntOrString,
    /// Protocol
    pub protocol: String,
    /// Port name
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dns_label_validation() {
        assert!(validate_dns_label("namespace", "chartmuseum").is_ok());
        assert!(validate_dns_label("namespace", "team-a1").is_ok());
        assert!(validate_dns_label("namespace", "Charts").is_err());
        assert!(validate_dns_label("namespace", "-charts").is_err());
        assert!(validate_dns_label("namespace", "").is_err());
        assert!(validate_dns_label("namespace", &"a".repeat(64)).is_err());
    }

    #[test]
    fn test_zero_unavailable_strategy_serializes_as_integer() {
        let strategy = DeploymentStrategy::zero_unavailable();
        assert_eq!(
            serde_json::to_value(&strategy).unwrap(),
            json!({"type": "RollingUpdate", "rollingUpdate": {"maxUnavailable": 0}})
        );
    }

    #[test]
    fn test_env_var_from_secret() {
        let env = EnvVar::from_secret("AWS_ACCESS_KEY_ID", "museum-secret", "AWS_ACCESS_KEY_ID");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "name": "AWS_ACCESS_KEY_ID",
                "valueFrom": {"secretKeyRef": {"name": "museum-secret", "key": "AWS_ACCESS_KEY_ID"}}
            })
        );
    }
}
