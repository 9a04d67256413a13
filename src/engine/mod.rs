//! Local preview engine
//!
//! Stands in for a real infrastructure engine so a whole stack can be
//! converged offline. Every node echoes its resolved inputs back as outputs,
//! plus the attributes a cloud provider would assign (names, ids, keys,
//! kubeconfigs). All generated values are deterministic.

pub mod naming;

use crate::kinds::{aws, azure, gcp, kubernetes, random, tls};
use anyhow::{Result, bail};
use declarative::{Attributes, Engine, ResourceNode};
use naming::{access_key_id, autoname, digest, private_ip, token, uuid};
use serde_json::{Value, json};
use std::collections::BTreeSet;

const ACCOUNT_ID: &str = "123456789012";
const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Engine that fabricates provider attributes locally
#[derive(Debug, Clone, Default)]
pub struct PreviewEngine {
    region: Option<String>,
    failing: BTreeSet<String>,
}

impl PreviewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region used in generated endpoints and ARNs
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Make realization of the given identities fail
    pub fn failing(mut self, identities: impl IntoIterator<Item = String>) -> Self {
        self.failing.extend(identities);
        self
    }

    fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-west-2")
    }
}

fn str_input<'a>(inputs: &'a Attributes, name: &str) -> Option<&'a str> {
    inputs.get(name).and_then(Value::as_str)
}

/// Kubernetes metadata with a name filled in
fn kube_metadata(node: &ResourceNode, inputs: &Attributes) -> Value {
    let mut metadata = inputs.get("metadata").cloned().unwrap_or_else(|| json!({}));
    if let Some(map) = metadata.as_object_mut() {
        map.entry("name")
            .or_insert_with(|| Value::String(autoname(&node.identity)));
        map.insert("uid".into(), Value::String(uuid(&node.identity, "uid")));
    }
    metadata
}

impl PreviewEngine {
    fn provider_attributes(&self, node: &ResourceNode, inputs: &Attributes) -> Result<Attributes> {
        let id = &node.identity;
        let name = autoname(id);
        let mut out = Attributes::new();

        match node.kind.as_str() {
            aws::BUCKET => {
                let bucket = str_input(inputs, "bucket").map_or(name, str::to_string);
                out.insert("arn".into(), json!(format!("arn:aws:s3:::{bucket}")));
                out.insert("bucket".into(), json!(bucket));
            }
            aws::IAM_USER => {
                let path = str_input(inputs, "path").unwrap_or("/");
                out.insert(
                    "arn".into(),
                    json!(format!("arn:aws:iam::{ACCOUNT_ID}:user{path}{name}")),
                );
                out.insert("name".into(), json!(name));
            }
            aws::IAM_USER_POLICY => {
                out.insert("name".into(), json!(name));
            }
            aws::IAM_ACCESS_KEY => {
                out.insert("id".into(), json!(access_key_id(id)));
                out.insert("secret".into(), json!(token(id, "secret", 40)));
            }
            aws::VPC => {
                out.insert("id".into(), json!(format!("vpc-{}", &digest(id, "vpc")[..17])));
                out.insert(
                    "publicSubnetIds".into(),
                    json!([
                        format!("subnet-{}", &digest(id, "subnet-a")[..17]),
                        format!("subnet-{}", &digest(id, "subnet-b")[..17]),
                    ]),
                );
            }
            aws::EKS_CLUSTER => {
                let endpoint = format!(
                    "https://{}.gr7.{}.eks.amazonaws.com",
                    digest(id, "endpoint")[..32].to_uppercase(),
                    self.region()
                );
                out.insert(
                    "kubeconfig".into(),
                    json!({
                        "apiVersion": "v1",
                        "kind": "Config",
                        "clusters": [{
                            "name": id,
                            "cluster": {
                                "server": endpoint,
                                "certificate-authority-data": token(id, "ca", 64),
                            },
                        }],
                        "contexts": [{ "name": "aws", "context": { "cluster": id, "user": "aws" } }],
                        "current-context": "aws",
                        "users": [{
                            "name": "aws",
                            "user": { "exec": {
                                "apiVersion": "client.authentication.k8s.io/v1beta1",
                                "command": "aws-iam-authenticator",
                                "args": ["token", "-i", name],
                            }},
                        }],
                    }),
                );
                out.insert("name".into(), json!(name));
            }
            azure::AD_APPLICATION => {
                out.insert("applicationId".into(), json!(uuid(id, "application")));
            }
            azure::AD_SERVICE_PRINCIPAL => {
                out.insert("id".into(), json!(uuid(id, "service-principal")));
            }
            azure::AD_SERVICE_PRINCIPAL_PASSWORD => {
                out.insert("keyId".into(), json!(uuid(id, "key")));
            }
            azure::RESOURCE_GROUP | azure::VIRTUAL_NETWORK | azure::SUBNET => {
                out.insert(
                    "id".into(),
                    json!(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{name}")),
                );
                out.insert("name".into(), json!(name));
            }
            azure::AKS_CLUSTER => {
                let prefix = str_input(inputs, "dnsPrefix").unwrap_or(id);
                let server = format!(
                    "https://{prefix}-{}.hcp.westus.azmk8s.io:443",
                    &digest(id, "fqdn")[..8]
                );
                out.insert(
                    "kubeConfigRaw".into(),
                    json!(format!(
                        "apiVersion: v1\nclusters:\n- cluster:\n    server: {server}\n  name: {name}\n\
                         contexts:\n- context:\n    cluster: {name}\n    user: clusterUser_{name}\n  name: {name}\n\
                         current-context: {name}\nkind: Config\nusers:\n- name: clusterUser_{name}\n  \
                         user:\n    token: {}\n",
                        token(id, "token", 32)
                    )),
                );
                out.insert("name".into(), json!(name));
            }
            gcp::GKE_CLUSTER => {
                out.insert("endpoint".into(), json!(private_ip(id)));
                out.insert(
                    "masterAuth".into(),
                    json!({ "clusterCaCertificate": token(id, "ca", 64) }),
                );
                out.insert("name".into(), json!(name));
            }
            gcp::BUCKET => {
                out.insert("url".into(), json!(format!("gs://{name}")));
                out.insert("name".into(), json!(name));
            }
            gcp::SERVICE_ACCOUNT => {
                let account = str_input(inputs, "accountId").unwrap_or(id);
                let email = format!("{account}@preview.iam.gserviceaccount.com");
                out.insert(
                    "name".into(),
                    json!(format!("projects/preview/serviceAccounts/{email}")),
                );
                out.insert("email".into(), json!(email));
            }
            gcp::BUCKET_IAM_MEMBER => {
                out.insert("etag".into(), json!(&digest(id, "etag")[..12]));
            }
            gcp::SERVICE_ACCOUNT_KEY => {
                out.insert("privateKey".into(), json!(token(id, "private-key", 96)));
            }
            random::RANDOM_STRING => {
                let length = inputs.get("length").and_then(Value::as_u64).unwrap_or(16);
                out.insert("result".into(), json!(token(id, "result", length as usize)));
            }
            tls::PRIVATE_KEY => {
                out.insert(
                    "publicKeyOpenssh".into(),
                    json!(format!("ssh-rsa {} nimbus\n", token(id, "public", 64))),
                );
            }
            kubernetes::PROVIDER => {
                if str_input(inputs, "kubeconfig").is_none_or(str::is_empty) {
                    bail!("kubernetes provider '{id}' has no kubeconfig");
                }
            }
            kubernetes::NAMESPACE
            | kubernetes::SECRET
            | kubernetes::SERVICE
            | kubernetes::DEPLOYMENT => {
                if node.provider.is_none() {
                    bail!("{} '{id}' has no cluster to target", node.kind);
                }
                out.insert("metadata".into(), kube_metadata(node, inputs));
            }
            _ if node.component => {}
            other => bail!("unsupported resource kind '{other}'"),
        }

        Ok(out)
    }
}

impl Engine for PreviewEngine {
    fn realize(&self, node: &ResourceNode, inputs: &Attributes) -> Result<Attributes> {
        if self.failing.contains(&node.identity) {
            bail!("simulated failure");
        }

        let mut attrs = inputs.clone();
        attrs.extend(self.provider_attributes(node, inputs)?);
        attrs.insert(
            "urn".into(),
            json!(format!("urn:nimbus::{}::{}", node.kind, node.identity)),
        );
        log::trace!("realized {} '{}'", node.kind, node.identity);
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Composition, DeclareOptions, Inputs, RealizeResult, converge_all, ConvergeOptions};

    fn realize(kind: &str, identity: &str, inputs: Attributes) -> Result<Attributes> {
        let mut comp = Composition::new("demo");
        let handle = comp
            .declare(kind, identity, DeclareOptions::new(), Inputs::new())
            .unwrap();
        let node = comp.node(handle.id()).unwrap();
        PreviewEngine::new().realize(node, &inputs)
    }

    #[test]
    fn test_bucket_is_auto_named() {
        let attrs = realize(aws::BUCKET, "charts-bucket", Attributes::new()).unwrap();
        let bucket = attrs["bucket"].as_str().unwrap();
        assert!(bucket.starts_with("charts-bucket-"));
        assert_eq!(attrs["arn"], format!("arn:aws:s3:::{bucket}"));
    }

    #[test]
    fn test_inputs_are_echoed() {
        let mut inputs = Attributes::new();
        inputs.insert("path".into(), json!("/chartmuseum/"));
        let attrs = realize(aws::IAM_USER, "user", inputs).unwrap();
        assert_eq!(attrs["path"], "/chartmuseum/");
        assert!(
            attrs["arn"]
                .as_str()
                .unwrap()
                .contains(":user/chartmuseum/user-")
        );
    }

    #[test]
    fn test_random_string_respects_length() {
        let mut inputs = Attributes::new();
        inputs.insert("length".into(), json!(20));
        let attrs = realize(random::RANDOM_STRING, "password", inputs).unwrap();
        assert_eq!(attrs["result"].as_str().unwrap().len(), 20);
    }

    #[test]
    fn test_unknown_kinds_and_unconfigured_providers_fail() {
        assert!(realize("acme:index:Widget", "w", Attributes::new()).is_err());
        assert!(realize(kubernetes::PROVIDER, "k8s", Attributes::new()).is_err());
        assert!(realize(kubernetes::NAMESPACE, "ns", Attributes::new()).is_err());
    }

    #[test]
    fn test_simulated_failure_skips_dependents() {
        let mut comp = Composition::new("demo");
        let bucket = comp
            .declare(aws::BUCKET, "bucket", DeclareOptions::new(), Inputs::new())
            .unwrap();
        let user = comp
            .declare(aws::IAM_USER, "user", DeclareOptions::new(), Inputs::new())
            .unwrap();
        let policy = comp
            .declare(
                aws::IAM_USER_POLICY,
                "policy",
                DeclareOptions::new().parent(&user),
                Inputs::new().set("policy", bucket.output_string("bucket")),
            )
            .unwrap();

        let engine = PreviewEngine::new().failing(["bucket".to_string()]);
        let run = converge_all(&comp, &engine, &ConvergeOptions::default()).unwrap();

        assert!(matches!(run.results[&bucket.id()], RealizeResult::Failed { .. }));
        assert_eq!(run.results[&user.id()], RealizeResult::Created);
        assert!(matches!(run.results[&policy.id()], RealizeResult::Skipped { .. }));
    }
}
