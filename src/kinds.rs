//! Type tokens for every resource kind the stacks declare

pub mod aws {
    pub const BUCKET: &str = "aws:s3/bucket:Bucket";
    pub const IAM_USER: &str = "aws:iam/user:User";
    pub const IAM_USER_POLICY: &str = "aws:iam/userPolicy:UserPolicy";
    pub const IAM_ACCESS_KEY: &str = "aws:iam/accessKey:AccessKey";
    pub const VPC: &str = "awsx:ec2:Vpc";
    pub const EKS_CLUSTER: &str = "eks:index:Cluster";
}

pub mod azure {
    pub const AD_APPLICATION: &str = "azuread:index/application:Application";
    pub const AD_SERVICE_PRINCIPAL: &str = "azuread:index/servicePrincipal:ServicePrincipal";
    pub const AD_SERVICE_PRINCIPAL_PASSWORD: &str =
        "azuread:index/servicePrincipalPassword:ServicePrincipalPassword";
    pub const RESOURCE_GROUP: &str = "azure:core/resourceGroup:ResourceGroup";
    pub const VIRTUAL_NETWORK: &str = "azure:network/virtualNetwork:VirtualNetwork";
    pub const SUBNET: &str = "azure:network/subnet:Subnet";
    pub const AKS_CLUSTER: &str = "azure:containerservice/kubernetesCluster:KubernetesCluster";
}

pub mod gcp {
    pub const GKE_CLUSTER: &str = "gcp:container/cluster:Cluster";
    pub const BUCKET: &str = "gcp:storage/bucket:Bucket";
    pub const BUCKET_IAM_MEMBER: &str = "gcp:storage/bucketIAMMember:BucketIAMMember";
    pub const SERVICE_ACCOUNT: &str = "gcp:serviceAccount/account:Account";
    pub const SERVICE_ACCOUNT_KEY: &str = "gcp:serviceAccount/key:Key";
}

pub mod kubernetes {
    pub const PROVIDER: &str = "pulumi:providers:kubernetes";
    pub const NAMESPACE: &str = "kubernetes:core/v1:Namespace";
    pub const SECRET: &str = "kubernetes:core/v1:Secret";
    pub const SERVICE: &str = "kubernetes:core/v1:Service";
    pub const DEPLOYMENT: &str = "kubernetes:apps/v1:Deployment";
}

pub mod random {
    pub const RANDOM_STRING: &str = "random:index/randomString:RandomString";
}

pub mod tls {
    pub const PRIVATE_KEY: &str = "tls:index/privateKey:PrivateKey";
}
