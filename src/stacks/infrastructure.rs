//! Shared infrastructure: network, directory, secrets and ECS capacity.
//!
//! Every other stack consumes handles produced here.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::config::{DeploymentConfig, StackKind, parse_cidr};
use crate::error::Result;
use crate::template::intrinsic::{
    assume_role_policy, base64, cidr, get_att, get_azs, managed_policy_arn, ref_to, select, sub,
    sub_with,
};
use crate::template::{Parameter, Resource};

use super::builder::{Stack, StackBuilder, StackDefinition};
use super::handles::{
    ActiveDirectory, AdInfo, DomainJoinTag, EcsCluster, Secret, SecurityGroup, SsmDocument,
    StringParameter, Vpc,
};

const VPC: &str = "Vpc";
const INTERNET_GATEWAY: &str = "InternetGateway";
const GATEWAY_ATTACHMENT: &str = "VpcGatewayAttachment";
const DIRECTORY: &str = "ActiveDirectory";
const ADMIN_SECRET: &str = "ActiveDirectoryAdminSecret";
const DOMAINLESS_SECRET: &str = "DomainlessIdentitySecret";
const ECS_SECURITY_GROUP: &str = "EcsAsgSecurityGroup";
const ECS_CLUSTER: &str = "EcsCluster";
const ECS_AMI_PARAMETER: &str = "EcsWindowsAmi";
const DOMAIN_JOIN_DOCUMENT: &str = "DomainJoinDocument";

/// Public SSM path of the latest ECS-optimized Windows Server 2022 AMI.
const ECS_WINDOWS_AMI_PATH: &str =
    "/aws/service/ami-windows-latest/Windows_Server-2022-English-Full-ECS_Optimized/image_id";

/// Plugin GUID of the Active Directory credential spec plugin for domainless gMSA.
const CCG_PLUGIN_GUID: &str = "{859E1386-BDB4-49E8-85C7-3070B13920E1}";

/// Directory user whose credentials the domainless gMSA plugin uses.
const DOMAINLESS_USER: &str = "ecs-gmsa-reader";

/// Number of availability zones the VPC spans.
const AZ_COUNT: usize = 2;

/// Inputs of the infrastructure stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureStackProps {
    /// Key pair installed on the ECS container instances.
    pub ecs_instance_key_pair_name: String,
    /// Whether ECS container instances carry the domain-join tag.
    pub domain_join_ecs_instances: bool,
}

/// Network, directory and shared compute resources.
#[derive(Debug)]
pub struct InfrastructureStack {
    definition: StackDefinition,
    props: InfrastructureStackProps,
    /// The shared VPC.
    pub vpc: Arc<Vpc>,
    /// The managed Microsoft AD directory.
    pub active_directory: Arc<ActiveDirectory>,
    /// Directory details needed to join instances.
    pub ad_info: Arc<AdInfo>,
    /// Security group of the ECS container instances.
    pub ecs_asg_security_group: Arc<SecurityGroup>,
    /// SSM parameter holding the gMSA credential spec.
    pub cred_spec_parameter: Arc<StringParameter>,
    /// Tag key that enrols instances in the domain-join association.
    pub ad_domain_join_tag_key: Arc<DomainJoinTag>,
    /// SSM document that joins an instance to the directory.
    pub domain_join_ssm_document: Arc<SsmDocument>,
    /// Credentials used by the domainless gMSA plugin.
    pub domainless_identity_secret: Arc<Secret>,
    /// Generated password of the directory `Admin` user.
    pub active_directory_admin_password_secret: Arc<Secret>,
    /// ECS cluster with Windows capacity.
    pub ecs_cluster: Arc<EcsCluster>,
}

impl InfrastructureStack {
    /// Builds the infrastructure stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be assembled.
    pub fn new(config: &DeploymentConfig, props: InfrastructureStackProps) -> Result<Self> {
        let mut b = StackBuilder::new(
            StackKind::Infrastructure,
            config,
            "Shared VPC, Managed Microsoft AD and ECS capacity for gMSA workloads",
        );

        let vpc = Arc::new(declare_network(&mut b, config)?);
        let active_directory_admin_password_secret = Arc::new(declare_admin_secret(&mut b)?);
        let active_directory = Arc::new(declare_directory(&mut b, config)?);
        let ad_info = Arc::new(AdInfo {
            directory_id: active_directory.directory_id.clone(),
            domain_name: active_directory.name.clone(),
            dns_ips: active_directory.dns_ips.clone(),
        });
        let ecs_asg_security_group = Arc::new(declare_security_group(&mut b)?);
        let domainless_identity_secret = Arc::new(declare_domainless_secret(&mut b, config)?);
        let cred_spec_parameter = Arc::new(declare_cred_spec(&mut b, config)?);
        let ad_domain_join_tag_key = Arc::new(DomainJoinTag {
            key: b.physical_name("domain-join"),
        });
        let domain_join_ssm_document =
            Arc::new(declare_domain_join(&mut b, config, &ad_domain_join_tag_key)?);
        let ecs_cluster = Arc::new(declare_ecs_capacity(
            &mut b,
            config,
            &props,
            &ad_domain_join_tag_key,
        )?);

        let definition = b.finish();
        info!(
            "Built stack {} ({} resources)",
            definition.name,
            definition.template.resources().len()
        );

        Ok(Self {
            definition,
            props,
            vpc,
            active_directory,
            ad_info,
            ecs_asg_security_group,
            cred_spec_parameter,
            ad_domain_join_tag_key,
            domain_join_ssm_document,
            domainless_identity_secret,
            active_directory_admin_password_secret,
            ecs_cluster,
        })
    }

    /// Inputs this stack was built from.
    #[must_use]
    pub const fn props(&self) -> &InfrastructureStackProps {
        &self.props
    }
}

impl Stack for InfrastructureStack {
    fn definition(&self) -> &StackDefinition {
        &self.definition
    }
}

/// Host bits of each subnet: the VPC is split into sixteen equal blocks,
/// never smaller than /28.
fn subnet_cidr_bits(vpc_cidr: &str) -> u8 {
    parse_cidr(vpc_cidr).map_or(8, |(_, prefix)| {
        32u8.saturating_sub(prefix.saturating_add(4).min(28))
    })
}

fn declare_network(b: &mut StackBuilder, config: &DeploymentConfig) -> Result<Vpc> {
    b.add(
        VPC,
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": config.vpc_cidr,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "Tags": b.name_tags("vpc")
            }),
        ),
    )?;
    b.add(
        INTERNET_GATEWAY,
        Resource::new(
            "AWS::EC2::InternetGateway",
            json!({ "Tags": b.name_tags("igw") }),
        ),
    )?;
    b.add(
        GATEWAY_ATTACHMENT,
        Resource::new(
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": ref_to(VPC), "InternetGatewayId": ref_to(INTERNET_GATEWAY) }),
        ),
    )?;

    let bits = subnet_cidr_bits(&config.vpc_cidr);
    let subnet_blocks = || cidr(get_att(VPC, "CidrBlock"), 4, bits);

    let mut public_ids = Vec::with_capacity(AZ_COUNT);
    let mut private_ids = Vec::with_capacity(AZ_COUNT);

    for az in 0..AZ_COUNT {
        let n = az + 1;

        let public = format!("PublicSubnet{n}");
        b.add(
            &public,
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": ref_to(VPC),
                    "AvailabilityZone": select(az, get_azs()),
                    "CidrBlock": select(az, subnet_blocks()),
                    "MapPublicIpOnLaunch": true,
                    "Tags": b.name_tags(&format!("public-{n}"))
                }),
            ),
        )?;
        public_ids.push(b.export(
            &format!("{public}Id"),
            ref_to(&public),
            &format!("Public subnet {n}"),
        )?);

        let private = format!("PrivateSubnet{n}");
        b.add(
            &private,
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": ref_to(VPC),
                    "AvailabilityZone": select(az, get_azs()),
                    "CidrBlock": select(az + AZ_COUNT, subnet_blocks()),
                    "MapPublicIpOnLaunch": false,
                    "Tags": b.name_tags(&format!("private-{n}"))
                }),
            ),
        )?;
        private_ids.push(b.export(
            &format!("{private}Id"),
            ref_to(&private),
            &format!("Private subnet {n}"),
        )?);
    }

    b.add(
        "NatEip",
        Resource::new("AWS::EC2::EIP", json!({ "Domain": "vpc" })).depends_on(GATEWAY_ATTACHMENT),
    )?;
    b.add(
        "NatGateway",
        Resource::new(
            "AWS::EC2::NatGateway",
            json!({
                "AllocationId": get_att("NatEip", "AllocationId"),
                "SubnetId": ref_to("PublicSubnet1"),
                "Tags": b.name_tags("nat")
            }),
        ),
    )?;

    declare_route_table(b, "Public", json!({ "GatewayId": ref_to(INTERNET_GATEWAY) }))?;
    declare_route_table(b, "Private", json!({ "NatGatewayId": ref_to("NatGateway") }))?;

    let vpc_id = b.export("VpcId", ref_to(VPC), "Shared VPC id")?;

    Ok(Vpc {
        vpc_id,
        public_subnet_ids: public_ids,
        private_subnet_ids: private_ids,
    })
}

/// Route table with a default route to `target`, associated with every
/// subnet of the tier.
fn declare_route_table(b: &mut StackBuilder, tier: &str, target: Value) -> Result<()> {
    let table = format!("{tier}RouteTable");
    b.add(
        &table,
        Resource::new(
            "AWS::EC2::RouteTable",
            json!({
                "VpcId": ref_to(VPC),
                "Tags": b.name_tags(&tier.to_lowercase())
            }),
        ),
    )?;

    let mut route = json!({
        "RouteTableId": ref_to(&table),
        "DestinationCidrBlock": "0.0.0.0/0"
    });
    if let (Some(route), Some(target)) = (route.as_object_mut(), target.as_object()) {
        route.extend(target.clone());
    }
    b.add(
        &format!("{tier}DefaultRoute"),
        Resource::new("AWS::EC2::Route", route).depends_on(GATEWAY_ATTACHMENT),
    )?;

    for n in 1..=AZ_COUNT {
        b.add(
            &format!("{tier}Subnet{n}RouteTableAssociation"),
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "RouteTableId": ref_to(&table),
                    "SubnetId": ref_to(&format!("{tier}Subnet{n}"))
                }),
            ),
        )?;
    }
    Ok(())
}

fn declare_admin_secret(b: &mut StackBuilder) -> Result<Secret> {
    let name = b.physical_name("ad-admin-password");
    b.add(
        ADMIN_SECRET,
        Resource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Name": name,
                "Description": "Password of the Managed Microsoft AD Admin user",
                "GenerateSecretString": {
                    "SecretStringTemplate": json!({ "username": "Admin" }).to_string(),
                    "GenerateStringKey": "password",
                    "PasswordLength": 32,
                    "ExcludeCharacters": "\"'@/\\"
                }
            }),
        ),
    )?;
    let arn = b.export(
        "ActiveDirectoryAdminSecretArn",
        ref_to(ADMIN_SECRET),
        "ARN of the directory Admin password secret",
    )?;
    Ok(Secret { arn, name })
}

fn declare_directory(b: &mut StackBuilder, config: &DeploymentConfig) -> Result<ActiveDirectory> {
    b.add(
        DIRECTORY,
        Resource::new(
            "AWS::DirectoryService::MicrosoftAD",
            json!({
                "Name": config.ad_domain_name,
                "ShortName": config.ad_short_name(),
                "Edition": config.ad_edition.to_string(),
                "Password": sub(&format!(
                    "{{{{resolve:secretsmanager:${{{ADMIN_SECRET}}}:SecretString:password}}}}"
                )),
                "VpcSettings": {
                    "VpcId": ref_to(VPC),
                    "SubnetIds": (1..=AZ_COUNT)
                        .map(|n| ref_to(&format!("PrivateSubnet{n}")))
                        .collect::<Vec<_>>()
                }
            }),
        ),
    )?;

    let dns_list = get_att(DIRECTORY, "DnsIpAddresses");

    b.add(
        "DhcpOptions",
        Resource::new(
            "AWS::EC2::DHCPOptions",
            json!({
                "DomainName": config.ad_domain_name,
                "DomainNameServers": dns_list,
                "Tags": b.name_tags("dhcp")
            }),
        ),
    )?;
    b.add(
        "VpcDhcpOptionsAssociation",
        Resource::new(
            "AWS::EC2::VPCDHCPOptionsAssociation",
            json!({ "VpcId": ref_to(VPC), "DhcpOptionsId": ref_to("DhcpOptions") }),
        ),
    )?;

    let directory_id = b.export("DirectoryId", ref_to(DIRECTORY), "Managed AD directory id")?;
    let alias = b.export(
        "DirectoryAlias",
        get_att(DIRECTORY, "Alias"),
        "Managed AD directory alias",
    )?;
    let dns_ips = b.export(
        "DirectoryDnsIps",
        json!({ "Fn::Join": [",", dns_list] }),
        "Comma separated directory DNS addresses",
    )?;

    Ok(ActiveDirectory {
        directory_id,
        alias,
        dns_ips,
        name: config.ad_domain_name.clone(),
        short_name: config.ad_short_name(),
    })
}

fn declare_security_group(b: &mut StackBuilder) -> Result<SecurityGroup> {
    b.add(
        ECS_SECURITY_GROUP,
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": "ECS container instances and tasks",
                "VpcId": ref_to(VPC),
                "Tags": b.name_tags("ecs-asg")
            }),
        ),
    )?;
    b.add(
        "EcsAsgSecurityGroupSelfIngress",
        Resource::new(
            "AWS::EC2::SecurityGroupIngress",
            json!({
                "GroupId": get_att(ECS_SECURITY_GROUP, "GroupId"),
                "SourceSecurityGroupId": get_att(ECS_SECURITY_GROUP, "GroupId"),
                "IpProtocol": "-1",
                "Description": "Traffic between ECS instances and tasks"
            }),
        ),
    )?;

    let group_id = b.export(
        "EcsAsgSecurityGroupId",
        get_att(ECS_SECURITY_GROUP, "GroupId"),
        "Security group of the ECS container instances",
    )?;
    Ok(SecurityGroup { group_id })
}

fn declare_domainless_secret(b: &mut StackBuilder, config: &DeploymentConfig) -> Result<Secret> {
    let name = b.physical_name("domainless-identity");
    b.add(
        DOMAINLESS_SECRET,
        Resource::new(
            "AWS::SecretsManager::Secret",
            json!({
                "Name": name,
                "Description": "Directory user the gMSA credential spec plugin authenticates as",
                "GenerateSecretString": {
                    "SecretStringTemplate": json!({
                        "username": DOMAINLESS_USER,
                        "domainName": config.ad_domain_name
                    }).to_string(),
                    "GenerateStringKey": "password",
                    "PasswordLength": 32,
                    "ExcludeCharacters": "\"'@/\\"
                }
            }),
        ),
    )?;
    let arn = b.export(
        "DomainlessIdentitySecretArn",
        ref_to(DOMAINLESS_SECRET),
        "ARN of the domainless gMSA identity secret",
    )?;
    Ok(Secret { arn, name })
}

/// Credential spec document; `${DomainlessSecretArn}` is substituted at deploy time.
fn cred_spec_document(config: &DeploymentConfig) -> String {
    let domain = &config.ad_domain_name;
    let short = config.ad_short_name();
    let gmsa = &config.gmsa_account_name;

    json!({
        "CmsPlugins": ["ActiveDirectory"],
        "DomainJoinConfig": {
            "Sid": "",
            "MachineAccountName": gmsa,
            "Guid": "",
            "DnsTreeName": domain,
            "DnsName": domain,
            "NetBiosName": short
        },
        "ActiveDirectoryConfig": {
            "GroupManagedServiceAccounts": [
                { "Name": gmsa, "Scope": domain },
                { "Name": gmsa, "Scope": short }
            ],
            "HostAccountConfig": {
                "PortableCcgVersion": "1",
                "PluginGUID": CCG_PLUGIN_GUID,
                "PluginInput": "{\"credentialArn\": \"${DomainlessSecretArn}\"}"
            }
        }
    })
    .to_string()
}

fn declare_cred_spec(b: &mut StackBuilder, config: &DeploymentConfig) -> Result<StringParameter> {
    let name = format!("/{}/credspec", config.solution_id);
    b.add(
        "CredSpecParameter",
        Resource::new(
            "AWS::SSM::Parameter",
            json!({
                "Name": name,
                "Type": "String",
                "Description": "gMSA credential spec for ECS tasks",
                "Value": sub_with(
                    &cred_spec_document(config),
                    [("DomainlessSecretArn", ref_to(DOMAINLESS_SECRET))]
                )
            }),
        ),
    )?;
    let arn = b.export(
        "CredSpecParameterArn",
        sub(&format!(
            "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter{name}"
        )),
        "ARN of the credential spec parameter",
    )?;
    Ok(StringParameter { name, arn })
}

fn declare_domain_join(
    b: &mut StackBuilder,
    config: &DeploymentConfig,
    tag: &DomainJoinTag,
) -> Result<SsmDocument> {
    b.add(
        DOMAIN_JOIN_DOCUMENT,
        Resource::new(
            "AWS::SSM::Document",
            json!({
                "Name": b.physical_name("domain-join"),
                "DocumentType": "Command",
                "Content": {
                    "schemaVersion": "2.2",
                    "description": format!("Join instances to {}", config.ad_domain_name),
                    "mainSteps": [{
                        "action": "aws:domainJoin",
                        "name": "domainJoin",
                        "inputs": {
                            "directoryId": ref_to(DIRECTORY),
                            "directoryName": config.ad_domain_name,
                            "dnsIpAddresses": get_att(DIRECTORY, "DnsIpAddresses")
                        }
                    }]
                }
            }),
        ),
    )?;
    b.add(
        "DomainJoinAssociation",
        Resource::new(
            "AWS::SSM::Association",
            json!({
                "Name": ref_to(DOMAIN_JOIN_DOCUMENT),
                "AssociationName": b.physical_name("domain-join"),
                "Targets": [{
                    "Key": format!("tag:{}", tag.key),
                    "Values": [DomainJoinTag::VALUE]
                }]
            }),
        ),
    )?;

    let name = b.export(
        "DomainJoinDocumentName",
        ref_to(DOMAIN_JOIN_DOCUMENT),
        "Name of the domain-join SSM document",
    )?;
    Ok(SsmDocument { name })
}

fn ecs_user_data() -> Value {
    base64(sub(&format!(
        "<powershell>\n\
         Import-Module ECSTools\n\
         [Environment]::SetEnvironmentVariable(\"ECS_GMSA_SUPPORTED\", $TRUE, \"Machine\")\n\
         Initialize-ECSAgent -Cluster ${{{ECS_CLUSTER}}} -EnableTaskIAMRole -EnableTaskENI -AwsvpcBlockIMDS\n\
         </powershell>"
    )))
}

fn declare_ecs_capacity(
    b: &mut StackBuilder,
    config: &DeploymentConfig,
    props: &InfrastructureStackProps,
    tag: &DomainJoinTag,
) -> Result<EcsCluster> {
    b.add(
        ECS_CLUSTER,
        Resource::new(
            "AWS::ECS::Cluster",
            json!({
                "ClusterName": b.physical_name("cluster"),
                "ClusterSettings": [{ "Name": "containerInsights", "Value": "enabled" }]
            }),
        ),
    )?;

    b.add(
        "EcsInstanceRole",
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("ec2.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy_arn("service-role/AmazonEC2ContainerServiceforEC2Role"),
                    managed_policy_arn("AmazonSSMManagedInstanceCore"),
                    managed_policy_arn("AmazonSSMDirectoryServiceAccess")
                ]
            }),
        ),
    )?;
    b.add(
        "EcsInstanceProfile",
        Resource::new(
            "AWS::IAM::InstanceProfile",
            json!({ "Roles": [ref_to("EcsInstanceRole")] }),
        ),
    )?;
    b.add_parameter(
        ECS_AMI_PARAMETER,
        Parameter::ssm_image_id(ECS_WINDOWS_AMI_PATH, "ECS-optimized Windows Server 2022 AMI"),
    )?;

    b.add(
        "EcsLaunchTemplate",
        Resource::new(
            "AWS::EC2::LaunchTemplate",
            json!({
                "LaunchTemplateName": b.physical_name("ecs-host"),
                "LaunchTemplateData": {
                    "ImageId": ref_to(ECS_AMI_PARAMETER),
                    "InstanceType": config.ecs_instance_type,
                    "KeyName": props.ecs_instance_key_pair_name,
                    "IamInstanceProfile": { "Arn": get_att("EcsInstanceProfile", "Arn") },
                    "SecurityGroupIds": [get_att(ECS_SECURITY_GROUP, "GroupId")],
                    "MetadataOptions": { "HttpTokens": "required" },
                    "UserData": ecs_user_data()
                }
            }),
        ),
    )?;

    let mut asg_tags = vec![json!({
        "Key": "Name",
        "Value": b.physical_name("ecs-host"),
        "PropagateAtLaunch": true
    })];
    if props.domain_join_ecs_instances {
        asg_tags.push(json!({
            "Key": tag.key,
            "Value": DomainJoinTag::VALUE,
            "PropagateAtLaunch": true
        }));
    }

    let desired = config.ecs_desired_capacity;
    b.add(
        "EcsAutoScalingGroup",
        Resource::new(
            "AWS::AutoScaling::AutoScalingGroup",
            json!({
                "MinSize": "0",
                "MaxSize": desired.saturating_mul(2).max(1).to_string(),
                "DesiredCapacity": desired.to_string(),
                "LaunchTemplate": {
                    "LaunchTemplateId": ref_to("EcsLaunchTemplate"),
                    "Version": get_att("EcsLaunchTemplate", "LatestVersionNumber")
                },
                "VPCZoneIdentifier": (1..=AZ_COUNT)
                    .map(|n| ref_to(&format!("PrivateSubnet{n}")))
                    .collect::<Vec<_>>(),
                "Tags": asg_tags
            }),
        )
        .depends_on("PrivateDefaultRoute"),
    )?;

    b.add(
        "EcsCapacityProvider",
        Resource::new(
            "AWS::ECS::CapacityProvider",
            json!({
                "AutoScalingGroupProvider": {
                    "AutoScalingGroupArn": ref_to("EcsAutoScalingGroup"),
                    "ManagedScaling": { "Status": "ENABLED", "TargetCapacity": 100 },
                    "ManagedTerminationProtection": "DISABLED"
                }
            }),
        ),
    )?;
    b.add(
        "EcsClusterCapacityProviders",
        Resource::new(
            "AWS::ECS::ClusterCapacityProviderAssociations",
            json!({
                "Cluster": ref_to(ECS_CLUSTER),
                "CapacityProviders": [ref_to("EcsCapacityProvider")],
                "DefaultCapacityProviderStrategy": [
                    { "CapacityProvider": ref_to("EcsCapacityProvider"), "Weight": 1 }
                ]
            }),
        ),
    )?;

    let cluster_name = b.export("EcsClusterName", ref_to(ECS_CLUSTER), "ECS cluster name")?;
    let capacity_provider = b.export(
        "EcsCapacityProviderName",
        ref_to("EcsCapacityProvider"),
        "Windows capacity provider name",
    )?;

    Ok(EcsCluster {
        cluster_name,
        capacity_provider,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            solution_id: String::from("demo"),
            ec2_instance_keypair_name: String::from("kp-1"),
            my_sg_ingress_ip: String::from("203.0.113.5/32"),
            ..DeploymentConfig::default()
        }
    }

    fn build(domain_join: bool) -> InfrastructureStack {
        InfrastructureStack::new(
            &config(),
            InfrastructureStackProps {
                ecs_instance_key_pair_name: String::from("kp-1"),
                domain_join_ecs_instances: domain_join,
            },
        )
        .unwrap()
    }

    fn asg_tag_keys(template: &Template) -> Vec<String> {
        template.resource("EcsAutoScalingGroup").unwrap().properties["Tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["Key"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_stack_identity() {
        let stack = build(false);
        assert_eq!(stack.stack_name(), "demo-infrastructure");
        assert_eq!(stack.kind(), StackKind::Infrastructure);
        assert!(stack.dependencies().is_empty());
    }

    #[test]
    fn test_network_resources() {
        let stack = build(false);
        let template = stack.template();
        assert_eq!(template.resources_of_type("AWS::EC2::Subnet").len(), 4);
        assert_eq!(template.resources_of_type("AWS::EC2::NatGateway").len(), 1);
        assert_eq!(stack.vpc.public_subnet_ids.len(), 2);
        assert_eq!(stack.vpc.private_subnet_ids.len(), 2);
        assert_eq!(stack.vpc.vpc_id.export_name, "demo-infrastructure:VpcId");

        let route = template.resource("PrivateDefaultRoute").unwrap();
        assert_eq!(route.properties["NatGatewayId"], json!({"Ref": "NatGateway"}));
        assert_eq!(route.properties["DestinationCidrBlock"], "0.0.0.0/0");
    }

    #[test]
    fn test_directory_uses_admin_secret() {
        let stack = build(false);
        let directory = stack.template().resource(DIRECTORY).unwrap();
        assert_eq!(directory.properties["Name"], "directory.gmsa.local");
        assert_eq!(directory.properties["ShortName"], "DIRECTORY");
        assert_eq!(
            directory.properties["Password"]["Fn::Sub"],
            "{{resolve:secretsmanager:${ActiveDirectoryAdminSecret}:SecretString:password}}"
        );
        assert_eq!(stack.active_directory.alias.output_id, "DirectoryAlias");
        assert_eq!(stack.ad_info.directory_id, stack.active_directory.directory_id);
        assert_eq!(stack.active_directory_admin_password_secret.name, "demo-ad-admin-password");
    }

    #[test]
    fn test_domain_join_tag_only_when_enabled() {
        let tag_key = String::from("demo-domain-join");

        let joined = build(true);
        assert_eq!(joined.ad_domain_join_tag_key.key, tag_key);
        assert!(asg_tag_keys(joined.template()).contains(&tag_key));

        let plain = build(false);
        assert!(!asg_tag_keys(plain.template()).contains(&tag_key));
    }

    #[test]
    fn test_association_targets_tag() {
        let stack = build(false);
        let association = stack.template().resource("DomainJoinAssociation").unwrap();
        assert_eq!(association.properties["Targets"][0]["Key"], "tag:demo-domain-join");
        assert_eq!(association.properties["Targets"][0]["Values"][0], "true");
    }

    #[test]
    fn test_cred_spec_parameter() {
        let stack = build(false);
        assert_eq!(stack.cred_spec_parameter.name, "/demo/credspec");
        let parameter = stack.template().resource("CredSpecParameter").unwrap();
        let body = parameter.properties["Value"]["Fn::Sub"][0].as_str().unwrap();
        let document: Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            document["ActiveDirectoryConfig"]["GroupManagedServiceAccounts"][0]["Name"],
            "WebApp01"
        );
        assert!(body.contains("${DomainlessSecretArn}"));
    }

    #[test]
    fn test_launch_template_uses_key_pair() {
        let stack = build(false);
        let lt = stack.template().resource("EcsLaunchTemplate").unwrap();
        assert_eq!(lt.properties["LaunchTemplateData"]["KeyName"], "kp-1");
        assert_eq!(stack.props().ecs_instance_key_pair_name, "kp-1");
        assert!(stack.template().parameters().contains_key(ECS_AMI_PARAMETER));
    }

    #[test]
    fn test_exports() {
        let stack = build(false);
        let exports = stack.template().export_names();
        for name in [
            "demo-infrastructure:VpcId",
            "demo-infrastructure:DirectoryAlias",
            "demo-infrastructure:EcsAsgSecurityGroupId",
            "demo-infrastructure:CredSpecParameterArn",
            "demo-infrastructure:DomainJoinDocumentName",
            "demo-infrastructure:DomainlessIdentitySecretArn",
            "demo-infrastructure:ActiveDirectoryAdminSecretArn",
            "demo-infrastructure:EcsClusterName",
        ] {
            assert!(exports.contains(&name), "missing export {name}");
        }
    }

    #[test]
    fn test_subnet_cidr_bits() {
        assert_eq!(subnet_cidr_bits("10.0.0.0/16"), 12);
        assert_eq!(subnet_cidr_bits("10.0.0.0/24"), 4);
        assert_eq!(subnet_cidr_bits("10.0.0.0/26"), 4);
        assert_eq!(subnet_cidr_bits("garbage"), 8);
    }
}
