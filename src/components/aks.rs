//! Managed AKS cluster with its own service principal and network

use super::{ClusterOutputs, declare_provider};
use crate::kinds::{azure, random, tls};
use declarative::{
    Component, Composition, DeclareOptions, Error, Inputs, NodeHandle, Result, Scope,
};
use serde_json::json;

/// Settings for a managed AKS cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AksClusterArgs {
    /// Azure location for the resource group
    pub location: String,
    pub node_count: u32,
    pub vm_size: String,
    pub os_disk_size_gb: u32,
    pub kubernetes_version: String,
    pub admin_username: String,
    pub vnet_cidr: String,
    pub subnet_cidr: String,
    pub dns_service_ip: String,
    pub service_cidr: String,
    pub docker_bridge_cidr: String,
}

impl Default for AksClusterArgs {
    fn default() -> Self {
        Self {
            location: "westus".to_string(),
            node_count: 2,
            vm_size: "Standard_B2s".to_string(),
            os_disk_size_gb: 30,
            kubernetes_version: "1.17.9".to_string(),
            admin_username: "aksuser".to_string(),
            vnet_cidr: "10.2.0.0/16".to_string(),
            subnet_cidr: "10.2.1.0/24".to_string(),
            dns_service_ip: "10.2.2.254".to_string(),
            service_cidr: "10.2.2.0/24".to_string(),
            docker_bridge_cidr: "172.17.0.1/16".to_string(),
        }
    }
}

/// An AKS cluster and a Kubernetes provider targeting it
#[derive(Debug, Clone)]
pub struct ManagedAksCluster {
    handle: NodeHandle,
    outputs: ClusterOutputs,
}

impl Component for ManagedAksCluster {
    const TYPE: &'static str = "examples:managed:AksCluster";
    type Outputs = ClusterOutputs;

    fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    fn outputs(&self) -> &ClusterOutputs {
        &self.outputs
    }
}

impl ManagedAksCluster {
    pub fn new(
        comp: &mut Composition,
        name: &str,
        args: &AksClusterArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        comp.atomically(|comp| Self::build(comp, name, args, opts))
    }

    fn build(
        comp: &mut Composition,
        name: &str,
        args: &AksClusterArgs,
        opts: DeclareOptions,
    ) -> Result<Self> {
        if args.node_count == 0 {
            return Err(Error::Configuration(format!(
                "AKS cluster '{name}' needs at least one node"
            )));
        }
        let scope = Scope::open::<Self>(comp, name, name, opts)?;

        // Service principal credentials
        let password = comp
            .declare(
                random::RANDOM_STRING,
                &scope.name("password"),
                scope.child().secret_output("result"),
                Inputs::new().set("length", 20u32).set("special", true),
            )?
            .output_string("result");

        let ssh_key = scope.declare(
            comp,
            tls::PRIVATE_KEY,
            "sshKey",
            Inputs::new().set("algorithm", "RSA").set("rsaBits", 4096u32),
        )?;

        let app = scope.declare(comp, azure::AD_APPLICATION, "ad-app", Inputs::new())?;
        let sp = scope.declare(
            comp,
            azure::AD_SERVICE_PRINCIPAL,
            "ad-sp",
            Inputs::new().set("applicationId", app.output("applicationId")),
        )?;
        let sp_password = comp.declare(
            azure::AD_SERVICE_PRINCIPAL_PASSWORD,
            &scope.name("ad-sp-password"),
            scope.child().secret_output("value"),
            Inputs::new()
                .set("servicePrincipalId", sp.output("id"))
                .set("value", password)
                .set("endDate", "2099-01-01T00:00:00Z"),
        )?;

        // Network
        let group = scope.declare(
            comp,
            azure::RESOURCE_GROUP,
            "rg",
            Inputs::new().set("location", args.location.as_str()),
        )?;
        let vnet = scope.declare(
            comp,
            azure::VIRTUAL_NETWORK,
            "vnet",
            Inputs::new()
                .set("resourceGroupName", group.output("name"))
                .set("addressSpaces", json!([args.vnet_cidr])),
        )?;
        let subnet = scope.declare(
            comp,
            azure::SUBNET,
            "subnet",
            Inputs::new()
                .set("resourceGroupName", group.output("name"))
                .set("virtualNetworkName", vnet.output("name"))
                .set("addressPrefixes", json!([args.subnet_cidr])),
        )?;

        let pool = {
            let (count, vm_size, disk) = (args.node_count, args.vm_size.clone(), args.os_disk_size_gb);
            subnet.output_string("id").map(move |subnet_id| {
                json!({
                    "name": "aksagentpool",
                    "nodeCount": count,
                    "vmSize": vm_size,
                    "osDiskSizeGb": disk,
                    "vnetSubnetId": subnet_id,
                })
            })
        };
        let linux_profile = {
            let admin = args.admin_username.clone();
            ssh_key
                .output_string("publicKeyOpenssh")
                .map(move |key| json!({ "adminUsername": admin, "sshKey": { "keyData": key } }))
        };
        let service_principal = app
            .output_string("applicationId")
            .zip(&sp_password.output_string("value"))
            .map(|(client_id, secret)| json!({ "clientId": client_id, "clientSecret": secret }));

        let cluster = comp.declare(
            azure::AKS_CLUSTER,
            &scope.name("cluster"),
            scope.child().secret_output("kubeConfigRaw"),
            Inputs::new()
                .set("resourceGroupName", group.output("name"))
                .set("defaultNodePool", pool)
                .set("dnsPrefix", name)
                .set("linuxProfile", linux_profile)
                .set("servicePrincipal", service_principal)
                .set("kubernetesVersion", args.kubernetes_version.as_str())
                .set("roleBasedAccessControl", json!({ "enabled": true }))
                .set(
                    "networkProfile",
                    json!({
                        "networkPlugin": "azure",
                        "dnsServiceIp": args.dns_service_ip,
                        "serviceCidr": args.service_cidr,
                        "dockerBridgeCidr": args.docker_bridge_cidr,
                    }),
                ),
        )?;

        let kubeconfig = cluster.output_string("kubeConfigRaw");
        let provider = declare_provider(comp, &scope, "aks", &kubeconfig)?;

        Ok(Self {
            handle: scope.handle().clone(),
            outputs: ClusterOutputs {
                provider,
                kubeconfig,
            },
        })
    }
}
