//! Managed EKS cluster in a dedicated VPC

use super::{ClusterOutputs, declare_provider};
use crate::kinds::aws;
use declarative::{
    Component, Composition, DeclareOptions, Error, Inputs, NodeHandle, Result, Scope,
};
use serde_json::json;

/// Settings for a managed EKS cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EksClusterArgs {
    pub vpc_cidr: String,
    pub instance_type: String,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub storage_class: String,
    pub deploy_dashboard: bool,
}

impl Default for EksClusterArgs {
    fn default() -> Self {
        Self {
            vpc_cidr: "172.16.0.0/16".to_string(),
            instance_type: "t2.medium".to_string(),
            desired_capacity: 2,
            min_size: 1,
            max_size: 2,
            storage_class: "gp2".to_string(),
            deploy_dashboard: false,
        }
    }
}

impl EksClusterArgs {
    fn validate(&self, name: &str) -> Result<()> {
        if self.min_size > self.desired_capacity || self.desired_capacity > self.max_size {
            return Err(Error::Configuration(format!(
                "EKS cluster '{name}': node group sizes must satisfy min ({}) <= desired ({}) <= max ({})",
                self.min_size, self.desired_capacity, self.max_size
            )));
        }
        Ok(())
    }
}

/// An EKS cluster and a Kubernetes provider targeting it
#[derive(Debug, Clone)]
pub struct ManagedEksCluster {
    handle: NodeHandle,
    outputs: ClusterOutputs,
}

impl Component for ManagedEksCluster {
    const TYPE: &'static str = "examples:managed:EksCluster";
    type Outputs = ClusterOutputs;

    fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    fn outputs(&self) -> &ClusterOutputs {
        &self.outputs
    }
}

impl ManagedEksCluster {
    pub fn new(
        comp: &mut Composition,
        name: &str,
        args: &EksClusterArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        args.validate(name)?;
        comp.atomically(|comp| {
            let scope = Scope::open::<Self>(comp, name, name, opts)?;

            let vpc = scope.declare(
                comp,
                aws::VPC,
                "vpc",
                Inputs::new()
                    .set("cidrBlock", args.vpc_cidr.as_str())
                    .set("tags", json!({ "Name": name })),
            )?;

            let cluster = scope.declare(
                comp,
                aws::EKS_CLUSTER,
                "cluster",
                Inputs::new()
                    .set("vpcId", vpc.output("id"))
                    .set("publicSubnetIds", vpc.output("publicSubnetIds"))
                    .set("instanceType", args.instance_type.as_str())
                    .set("desiredCapacity", args.desired_capacity)
                    .set("minSize", args.min_size)
                    .set("maxSize", args.max_size)
                    .set("storageClasses", args.storage_class.as_str())
                    .set("deployDashboard", args.deploy_dashboard),
            )?;

            let kubeconfig = cluster.output_string("kubeconfig");
            let provider = declare_provider(comp, &scope, "provider", &kubeconfig)?;

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
