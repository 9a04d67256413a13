//! Stack configuration (`nimbus.toml`)

use crate::components::CloudKind;
use crate::kube::validate_dns_label;
use crate::paths;
use crate::scenario::Scenario;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by every scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Project name; used for cluster and namespace names
    pub project: String,
    pub aws: AwsConfig,
    pub azure: AzureConfig,
    pub gcp: GcpConfig,
    pub chartmuseum: ChartMuseumConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project: "nimbus".to_string(),
            aws: AwsConfig::default(),
            azure: AzureConfig::default(),
            gcp: GcpConfig::default(),
            chartmuseum: ChartMuseumConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AzureConfig {
    pub location: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            location: "westus".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GcpConfig {
    /// No default; GKE scenarios need it set
    pub project: Option<String>,
    pub region: String,
    pub zone: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: "us-west1".to_string(),
            zone: "us-west1-a".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartMuseumConfig {
    pub namespace: Option<String>,
    pub replicas: Option<u32>,
    pub api: Option<bool>,
    pub metrics: Option<bool>,
    pub service_type: Option<String>,
    /// Storage cloud: `aws` or `gcp`
    pub cloud: String,
    /// Storage region; defaults to the cloud's configured region
    pub region: Option<String>,
}

impl Default for ChartMuseumConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            replicas: None,
            api: None,
            metrics: None,
            service_type: None,
            cloud: "aws".to_string(),
            region: None,
        }
    }
}

impl StackConfig {
    /// Parse a stack file's contents
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid stack file")
    }

    /// Load a stack file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Load the first stack file that exists, or the defaults
    ///
    /// An explicitly requested file must exist.
    pub fn load(explicit: Option<&str>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(explicit) = explicit {
            let path = paths::expand(explicit);
            return Ok((Self::load_from(&path)?, Some(path)));
        }
        for path in paths::stack_file_candidates(None)? {
            if path.is_file() {
                log::debug!("Loading stack file {}", path.display());
                return Ok((Self::load_from(&path)?, Some(path)));
            }
        }
        log::debug!("No stack file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Could not serialize stack config")
    }

    /// Storage cloud for ChartMuseum
    pub fn chartmuseum_cloud(&self) -> declarative::Result<CloudKind> {
        self.chartmuseum.cloud.parse()
    }

    /// Storage region for ChartMuseum, falling back to the cloud's region
    pub fn chartmuseum_region(&self) -> Option<&str> {
        self.chartmuseum
            .region
            .as_deref()
            .or_else(|| match self.chartmuseum_cloud().ok()? {
                CloudKind::Aws => Some(self.aws.region.as_str()),
                CloudKind::Gcp => Some(self.gcp.region.as_str()),
            })
            .filter(|r| !r.is_empty())
    }

    /// Check names and discriminators that are independent of the scenario
    pub fn validate(&self) -> declarative::Result<()> {
        validate_dns_label("project", &self.project)?;
        if let Some(ns) = &self.chartmuseum.namespace {
            validate_dns_label("namespace", ns)?;
        }
        self.chartmuseum_cloud()?;
        Ok(())
    }

    /// Settings a scenario needs that are missing, as dotted keys
    pub fn missing_for(&self, scenario: Scenario) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let needs = |s: Scenario| scenario == s || scenario == Scenario::MultiCloud;

        if needs(Scenario::Aks) && self.azure.location.is_empty() {
            missing.push("azure.location");
        }
        if needs(Scenario::Gke) {
            if self.gcp.project.as_deref().is_none_or(str::is_empty) {
                missing.push("gcp.project");
            }
            if self.gcp.zone.is_empty() {
                missing.push("gcp.zone");
            }
        }
        if scenario == Scenario::Chartmuseum && self.chartmuseum_region().is_none() {
            missing.push("chartmuseum.region");
        }
        missing
    }

    /// Fail with the first setting a scenario is missing
    pub fn require_for(&self, scenario: Scenario) -> declarative::Result<()> {
        match self.missing_for(scenario).first() {
            Some(key) => Err(declarative::Error::MissingInput {
                input: (*key).to_string(),
                owner: format!("scenario '{}'", scenario.name()),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = StackConfig::from_toml("project = \"demo\"\n").unwrap();
        assert_eq!(config.project, "demo");
        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.azure.location, "westus");
        assert_eq!(config.gcp.zone, "us-west1-a");
        assert_eq!(config.chartmuseum.cloud, "aws");
        assert_eq!(config.chartmuseum_region(), Some("us-west-2"));
    }

    #[test]
    fn test_full_stack_file() {
        let content = r#"
project = "charts"

[gcp]
project = "acme-dev"
region = "europe-west1"

[chartmuseum]
namespace = "helm"
replicas = 2
api = true
service_type = "LoadBalancer"
cloud = "gcp"
"#;
        let config = StackConfig::from_toml(content).unwrap();
        assert_eq!(config.gcp.project.as_deref(), Some("acme-dev"));
        assert_eq!(config.chartmuseum.replicas, Some(2));
        assert_eq!(config.chartmuseum_cloud().unwrap(), CloudKind::Gcp);
        assert_eq!(config.chartmuseum_region(), Some("europe-west1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(StackConfig::from_toml("[aws]\nzone = \"a\"\n").is_err());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut config = StackConfig::default();
        config.chartmuseum.cloud = "azure".into();
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = StackConfig::default();
        config.project = "My_Project".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_settings_per_scenario() {
        let config = StackConfig::default();
        assert!(config.missing_for(Scenario::Eks).is_empty());
        assert!(config.missing_for(Scenario::Aks).is_empty());
        assert_eq!(config.missing_for(Scenario::Gke), vec!["gcp.project"]);
        assert_eq!(config.missing_for(Scenario::MultiCloud), vec!["gcp.project"]);

        let err = config.require_for(Scenario::Gke).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("gcp.project"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.toml");
        fs::write(&path, "project = \"from-file\"\n").unwrap();

        let (config, source) = StackConfig::load(path.to_str()).unwrap();
        assert_eq!(config.project, "from-file");
        assert_eq!(source.as_deref(), Some(path.as_path()));

        assert!(StackConfig::load(dir.path().join("missing.toml").to_str()).is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_settings() {
        let mut config = StackConfig::default();
        config.gcp.project = Some("acme".into());
        let rendered = config.to_toml().unwrap();
        assert_eq!(StackConfig::from_toml(&rendered).unwrap(), config);
    }
}
