//! Object storage backends for ChartMuseum
//!
//! Each cloud declares its own bucket, identity and credential secret, but
//! every branch hands back the same [`StorageBackend`] shape so the deployment
//! never needs to know which cloud it runs on.

use super::metadata_name;
use crate::kinds::{aws, gcp, kubernetes};
use crate::kube::{
    EnvVar, Labels, ObjectMeta, SecretVolumeSource, Volume, VolumeMount,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use declarative::{
    Composition, DeclareOptions, Deferred, Error, Inputs, NodeHandle, ProviderRef, Result, Scope,
};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Cloud a ChartMuseum instance keeps its charts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudKind {
    Aws,
    Gcp,
}

impl CloudKind {
    /// All supported clouds
    pub const ALL: [CloudKind; 2] = [CloudKind::Aws, CloudKind::Gcp];

    /// Discriminator as written in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudKind::Aws => "aws",
            CloudKind::Gcp => "gcp",
        }
    }

    /// Storage family name ChartMuseum expects in `STORAGE`
    pub fn storage_family(&self) -> &'static str {
        match self {
            CloudKind::Aws => "amazon",
            CloudKind::Gcp => "google",
        }
    }
}

impl fmt::Display for CloudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CloudKind::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unsupported cloud '{s}' (expected one of: aws, gcp)"
                ))
            })
    }
}

/// Backend-specific storage variable, e.g. `STORAGE_AMAZON_REGION`
pub fn storage_env_key(family: &str, suffix: &str) -> String {
    format!("STORAGE_{}_{}", family.to_uppercase(), suffix)
}

/// How the storage credentials reach the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Secret keys exposed as environment variables of the same name
    Env(&'static [&'static str]),
    /// Secret mounted as files, with a variable pointing at one of them
    File {
        mount_path: &'static str,
        file: &'static str,
        env: &'static str,
    },
}

const CREDENTIALS_VOLUME: &str = "storage-credentials";

/// Storage provisioned for one ChartMuseum instance
#[derive(Debug, Clone)]
pub struct StorageBackend {
    pub cloud: CloudKind,
    pub region: String,
    /// Engine-assigned bucket name
    pub bucket: Deferred<String>,
    /// Name of the Kubernetes secret holding the credentials
    pub secret_name: Deferred<String>,
    pub credentials: Credentials,
}

impl StorageBackend {
    /// `STORAGE*` variables, in the order the container receives them
    pub fn env(&self) -> Deferred<Vec<(String, String)>> {
        let family = self.cloud.storage_family();
        let region = self.region.clone();
        self.bucket.map(move |bucket| storage_vars(family, &region, bucket))
    }

    /// Container environment once bucket and secret names are known
    pub fn container_env(&self, bucket: String, secret_name: &str) -> Vec<EnvVar> {
        let mut env: Vec<EnvVar> = storage_vars(self.cloud.storage_family(), &self.region, bucket)
            .into_iter()
            .map(|(name, value)| EnvVar::value(name, value))
            .collect();
        match &self.credentials {
            Credentials::Env(keys) => {
                env.extend(keys.iter().map(|k| EnvVar::from_secret(*k, secret_name, k)));
            }
            Credentials::File {
                mount_path,
                file,
                env: var,
            } => env.push(EnvVar::value(*var, format!("{mount_path}/{file}"))),
        }
        env
    }

    /// Volumes needed to deliver the credentials
    pub fn volumes(&self, secret_name: &str) -> Vec<Volume> {
        match self.credentials {
            Credentials::Env(_) => Vec::new(),
            Credentials::File { .. } => vec![Volume {
                name: CREDENTIALS_VOLUME.to_string(),
                empty_dir: None,
                secret: Some(SecretVolumeSource {
                    secret_name: secret_name.to_string(),
                }),
            }],
        }
    }

    /// Mounts matching [`StorageBackend::volumes`]
    pub fn volume_mounts(&self) -> Vec<VolumeMount> {
        match self.credentials {
            Credentials::Env(_) => Vec::new(),
            Credentials::File { mount_path, .. } => vec![VolumeMount {
                name: CREDENTIALS_VOLUME.to_string(),
                mount_path: mount_path.to_string(),
                read_only: true,
            }],
        }
    }
}

fn storage_vars(family: &str, region: &str, bucket: String) -> Vec<(String, String)> {
    vec![
        ("STORAGE".to_string(), family.to_string()),
        (storage_env_key(family, "REGION"), region.to_string()),
        (storage_env_key(family, "BUCKET"), bucket),
    ]
}

/// Where the credential secret lives
pub struct SecretTarget<'a> {
    pub namespace: &'a NodeHandle,
    pub namespace_name: &'a Deferred<String>,
    pub provider: &'a ProviderRef,
    pub labels: &'a Labels,
}

/// Declare the storage resources for a cloud
pub fn provision(
    comp: &mut Composition,
    scope: &Scope,
    cloud: CloudKind,
    region: &str,
    target: SecretTarget<'_>,
) -> Result<StorageBackend> {
    let (bucket, data, credentials) = match cloud {
        CloudKind::Aws => provision_s3(comp, scope)?,
        CloudKind::Gcp => provision_gcs(comp, scope, region)?,
    };

    let labels = target.labels.clone();
    let metadata = target
        .namespace_name
        .map(move |ns| ObjectMeta::namespaced(ns, &labels))
        .to_value();
    let secret = comp.declare(
        kubernetes::SECRET,
        &scope.name("secret"),
        DeclareOptions::new()
            .parent(target.namespace)
            .provider(target.provider)
            .secret_output("data"),
        Inputs::new().set("metadata", metadata).set("data", data),
    )?;

    Ok(StorageBackend {
        cloud,
        region: region.to_string(),
        bucket,
        secret_name: metadata_name(&secret),
        credentials,
    })
}

type Branch = (Deferred<String>, Deferred<Value>, Credentials);

fn encode(value: String) -> String {
    STANDARD.encode(value)
}

/// Bucket policy letting the chart user list the bucket and manage its objects
pub fn s3_bucket_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "AllowListObjects",
                "Effect": "Allow",
                "Action": ["s3:ListBucket"],
                "Resource": format!("arn:aws:s3:::{bucket}"),
            },
            {
                "Sid": "AllowObjectsCRUD",
                "Effect": "Allow",
                "Action": ["s3:DeleteObject", "s3:GetObject", "s3:PutObject"],
                "Resource": format!("arn:aws:s3:::{bucket}/*"),
            }
        ],
    })
}

fn provision_s3(comp: &mut Composition, scope: &Scope) -> Result<Branch> {
    let bucket = scope.declare(comp, aws::BUCKET, "bucket", Inputs::new())?;
    let bucket_name = bucket.output_string("bucket");

    let user = scope.declare(
        comp,
        aws::IAM_USER,
        "iam-user",
        Inputs::new().set("path", "/chartmuseum/"),
    )?;

    let policy = bucket_name.map(|name| s3_bucket_policy(&name).to_string());
    comp.declare(
        aws::IAM_USER_POLICY,
        &scope.name("iam-policy"),
        DeclareOptions::new().parent(&user),
        Inputs::new()
            .set("user", user.output("name"))
            .set("policy", policy),
    )?;

    let key = comp.declare(
        aws::IAM_ACCESS_KEY,
        &scope.name("iam-accesskey"),
        DeclareOptions::new().parent(&user).secret_output("secret"),
        Inputs::new().set("user", user.output("name")),
    )?;

    let key_id = key.output_string("id").map(encode);
    let key_secret = key.output_string("secret").map(encode);
    let data = key_id.zip(&key_secret).map(|(id, secret)| {
        json!({
            "AWS_ACCESS_KEY_ID": id,
            "AWS_SECRET_ACCESS_KEY": secret,
        })
    });

    Ok((
        bucket_name,
        data,
        Credentials::Env(&["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]),
    ))
}

/// GCP service account ids are limited to 30 characters
fn service_account_id(scope: &Scope) -> String {
    let id = scope.name("sa");
    let trimmed: String = id.chars().take(30).collect();
    trimmed.trim_end_matches('-').to_string()
}

fn provision_gcs(comp: &mut Composition, scope: &Scope, region: &str) -> Result<Branch> {
    let bucket = scope.declare(
        comp,
        gcp::BUCKET,
        "bucket",
        Inputs::new().set("location", region.to_uppercase()),
    )?;
    let bucket_name = bucket.output_string("name");

    let account = scope.declare(
        comp,
        gcp::SERVICE_ACCOUNT,
        "service-account",
        Inputs::new()
            .set("accountId", service_account_id(scope))
            .set("displayName", "ChartMuseum chart storage"),
    )?;

    comp.declare(
        gcp::BUCKET_IAM_MEMBER,
        &scope.name("bucket-member"),
        DeclareOptions::new().parent(&account),
        Inputs::new()
            .set("bucket", bucket_name.clone())
            .set("role", "roles/storage.objectAdmin")
            .set(
                "member",
                account
                    .output_string("email")
                    .map(|email| format!("serviceAccount:{email}")),
            ),
    )?;

    let key = comp.declare(
        gcp::SERVICE_ACCOUNT_KEY,
        &scope.name("service-account-key"),
        DeclareOptions::new()
            .parent(&account)
            .secret_output("privateKey"),
        Inputs::new().set("serviceAccountId", account.output("name")),
    )?;

    // The provider already returns the key file base64-encoded
    let data = key
        .output_string("privateKey")
        .map(|key| json!({ "credentials.json": key }));

    Ok((
        bucket_name,
        data,
        Credentials::File {
            mount_path: "/etc/chartmuseum/gcp",
            file: "credentials.json",
            env: "GOOGLE_APPLICATION_CREDENTIALS",
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_env_key_derivation() {
        assert_eq!(storage_env_key("amazon", "REGION"), "STORAGE_AMAZON_REGION");
        assert_eq!(storage_env_key("google", "BUCKET"), "STORAGE_GOOGLE_BUCKET");
        assert_eq!(
            storage_env_key(CloudKind::Aws.storage_family(), "BUCKET"),
            "STORAGE_AMAZON_BUCKET"
        );
    }

    #[test]
    fn test_cloud_kind_parsing() {
        assert_eq!("aws".parse::<CloudKind>().unwrap(), CloudKind::Aws);
        assert_eq!("gcp".parse::<CloudKind>().unwrap(), CloudKind::Gcp);

        let err = "azure".parse::<CloudKind>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("azure"));
        assert!("AWS".parse::<CloudKind>().is_err());
    }

    #[test]
    fn test_s3_policy_scopes_bucket_and_objects() {
        let policy = s3_bucket_policy("charts-1a2b3c4");
        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(
            policy["Statement"][0]["Resource"],
            "arn:aws:s3:::charts-1a2b3c4"
        );
        assert_eq!(
            policy["Statement"][1]["Resource"],
            "arn:aws:s3:::charts-1a2b3c4/*"
        );
        assert_eq!(policy["Statement"][1]["Action"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_service_account_id_fits_gcp_limit() {
        let mut comp = Composition::new("demo");
        let scope = Scope::open::<crate::components::ChartMuseum>(
            &mut comp,
            "a-rather-long-museum-name",
            "chartmuseum-a-rather-long-museum-name",
            DeclareOptions::new(),
        )
        .unwrap();
        let id = service_account_id(&scope);
        assert!(id.len() <= 30);
        assert!(!id.ends_with('-'));
    }

    #[test]
    fn test_credentials_delivery_per_cloud() {
        let backend = |cloud, credentials| StorageBackend {
            cloud,
            region: "us-west-2".into(),
            bucket: Deferred::known("charts".to_string()),
            secret_name: Deferred::known("creds".to_string()),
            credentials,
        };

        let s3 = backend(
            CloudKind::Aws,
            Credentials::Env(&["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]),
        );
        let env = s3.container_env("charts".into(), "creds");
        let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "STORAGE",
                "STORAGE_AMAZON_REGION",
                "STORAGE_AMAZON_BUCKET",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
            ]
        );
        assert!(env[3].value.is_none());
        assert!(s3.volumes("creds").is_empty());

        let gcs = backend(
            CloudKind::Gcp,
            Credentials::File {
                mount_path: "/etc/chartmuseum/gcp",
                file: "credentials.json",
                env: "GOOGLE_APPLICATION_CREDENTIALS",
            },
        );
        let env = gcs.container_env("charts".into(), "creds");
        assert_eq!(env[0].value.as_deref(), Some("google"));
        assert_eq!(
            env.last().unwrap().value.as_deref(),
            Some("/etc/chartmuseum/gcp/credentials.json")
        );
        assert_eq!(gcs.volumes("creds").len(), 1);
        assert_eq!(gcs.volume_mounts()[0].mount_path, "/etc/chartmuseum/gcp");
    }
}
