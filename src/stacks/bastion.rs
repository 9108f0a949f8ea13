//! Windows management host for the directory and the database.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DeploymentConfig, StackKind, ingress_cidr as normalize_ingress};
use crate::error::{ConfigError, RequiredField, Result, SynthError};
use crate::template::intrinsic::{
    allow, assume_role_policy, base64, get_att, managed_policy_arn, ref_to, sub, sub_with,
};
use crate::template::{Parameter, Resource};

use super::builder::{Stack, StackBuilder, StackDefinition};
use super::database::SQL_SERVER_PORT;
use super::handles::{
    ActiveDirectory, AdInfo, DatabaseInstance, DomainJoinTag, Secret, SsmDocument,
    StringParameter, Vpc,
};

const INSTANCE: &str = "BastionInstance";
const SECURITY_GROUP: &str = "BastionSecurityGroup";
const ROLE: &str = "BastionRole";
const AMI_PARAMETER: &str = "BastionWindowsAmi";

/// Public SSM path of the latest Windows Server 2022 base AMI.
const WINDOWS_AMI_PATH: &str =
    "/aws/service/ami-windows-latest/Windows_Server-2022-English-Full-Base";

/// Remote desktop port.
pub const RDP_PORT: u16 = 3389;

/// Inputs of the bastion stack.
#[derive(Debug, Clone)]
pub struct BastionStackProps {
    /// The shared VPC.
    pub vpc: Arc<Vpc>,
    /// Directory details for joining the host.
    pub ad_info: Arc<AdInfo>,
    /// Key pair used to decrypt the Windows administrator password.
    pub ec2_instance_key_pair_name: String,
    /// Address or CIDR allowed to reach the host over RDP.
    pub my_sg_ingress_ip: String,
    /// The managed directory.
    pub active_directory: Arc<ActiveDirectory>,
    /// Secret holding the directory `Admin` password.
    pub active_directory_admin_password_secret: Arc<Secret>,
    /// Document that joins the host to the directory.
    pub domain_join_ssm_document: Arc<SsmDocument>,
    /// Tag enrolling the host in the domain-join association.
    pub ad_domain_join_tag_key: Arc<DomainJoinTag>,
    /// The SQL Server instance administered from the host.
    pub database_instance: Arc<DatabaseInstance>,
    /// Parameter holding the gMSA credential spec.
    pub cred_spec_parameter: Arc<StringParameter>,
    /// Credentials of the domainless gMSA identity.
    pub domainless_identity_secret: Arc<Secret>,
}

/// The management instance.
#[derive(Debug)]
pub struct BastionStack {
    definition: StackDefinition,
    props: BastionStackProps,
    ingress_cidr: String,
}

impl BastionStack {
    /// Builds the bastion stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingress address is not an IPv4 address or
    /// CIDR, or if the template cannot be assembled.
    pub fn new(config: &DeploymentConfig, props: BastionStackProps) -> Result<Self> {
        let ingress_cidr = ingress_cidr(&props.my_sg_ingress_ip)?;
        let mut b = StackBuilder::new(
            StackKind::Bastion,
            config,
            "Active Directory management instance",
        );

        let vpc_id = b.import(&props.vpc.vpc_id)?;
        let public_subnet = props
            .vpc
            .public_subnet_ids
            .first()
            .map(|subnet| b.import(subnet))
            .transpose()?
            .ok_or_else(|| SynthError::internal("VPC has no public subnet"))?;
        let db_group_id = b.import(&props.database_instance.security_group_id)?;

        b.add(
            SECURITY_GROUP,
            Resource::new(
                "AWS::EC2::SecurityGroup",
                json!({
                    "GroupDescription": "RDP access to the AD management instance",
                    "VpcId": vpc_id,
                    "SecurityGroupIngress": [{
                        "IpProtocol": "tcp",
                        "FromPort": RDP_PORT,
                        "ToPort": RDP_PORT,
                        "CidrIp": ingress_cidr,
                        "Description": "RDP from the allow-listed address"
                    }],
                    "Tags": b.name_tags("bastion")
                }),
            ),
        )?;
        b.add(
            "DatabaseIngressFromBastion",
            Resource::new(
                "AWS::EC2::SecurityGroupIngress",
                json!({
                    "GroupId": db_group_id,
                    "SourceSecurityGroupId": get_att(SECURITY_GROUP, "GroupId"),
                    "IpProtocol": "tcp",
                    "FromPort": SQL_SERVER_PORT,
                    "ToPort": SQL_SERVER_PORT,
                    "Description": "SQL Server from the AD management instance"
                }),
            ),
        )?;

        declare_role(&mut b, &props)?;

        b.add_parameter(
            AMI_PARAMETER,
            Parameter::ssm_image_id(WINDOWS_AMI_PATH, "Windows Server 2022 base AMI"),
        )?;
        let user_data = user_data(&mut b, &props)?;
        b.add(
            INSTANCE,
            Resource::new(
                "AWS::EC2::Instance",
                json!({
                    "ImageId": ref_to(AMI_PARAMETER),
                    "InstanceType": config.bastion_instance_type,
                    "KeyName": props.ec2_instance_key_pair_name,
                    "IamInstanceProfile": ref_to("BastionInstanceProfile"),
                    "NetworkInterfaces": [{
                        "DeviceIndex": "0",
                        "SubnetId": public_subnet,
                        "AssociatePublicIpAddress": true,
                        "GroupSet": [get_att(SECURITY_GROUP, "GroupId")]
                    }],
                    "MetadataOptions": { "HttpTokens": "required" },
                    "UserData": user_data,
                    "Tags": [
                        { "Key": "Name", "Value": b.physical_name("ad-management") },
                        { "Key": props.ad_domain_join_tag_key.key, "Value": DomainJoinTag::VALUE }
                    ]
                }),
            ),
        )?;

        b.output("BastionInstanceId", ref_to(INSTANCE), "AD management instance id")?;
        b.output(
            "BastionPublicDnsName",
            get_att(INSTANCE, "PublicDnsName"),
            "Public DNS name for RDP",
        )?;

        let definition = b.finish();
        info!(
            "Built stack {} ({} resources, RDP from {})",
            definition.name,
            definition.template.resources().len(),
            ingress_cidr
        );

        Ok(Self {
            definition,
            props,
            ingress_cidr,
        })
    }

    /// Inputs this stack was built from.
    #[must_use]
    pub const fn props(&self) -> &BastionStackProps {
        &self.props
    }

    /// CIDR allowed to reach the host over RDP.
    #[must_use]
    pub fn ingress_cidr(&self) -> &str {
        &self.ingress_cidr
    }
}

impl Stack for BastionStack {
    fn definition(&self) -> &StackDefinition {
        &self.definition
    }
}

/// Normalizes the allow-listed address: a bare IPv4 address becomes a /32.
fn ingress_cidr(raw: &str) -> Result<String> {
    let cidr = normalize_ingress(raw).ok_or_else(|| {
        ConfigError::invalid(
            RequiredField::MySgIngressIp.env_var(),
            raw.trim(),
            "expected an IPv4 address or CIDR block",
        )
    })?;
    if !raw.contains('/') {
        debug!("Widening ingress address {} to {cidr}", raw.trim());
    }
    Ok(cidr)
}

fn declare_role(b: &mut StackBuilder, props: &BastionStackProps) -> Result<()> {
    let admin_secret = b.import(&props.active_directory_admin_password_secret.arn)?;
    let domainless_secret = b.import(&props.domainless_identity_secret.arn)?;
    let cred_spec = b.import(&props.cred_spec_parameter.arn)?;
    let document = b.import(&props.domain_join_ssm_document.name)?;

    let document_arn = sub_with(
        "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:document/${Document}",
        [("Document", document)],
    );

    b.add(
        ROLE,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role_policy("ec2.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy_arn("AmazonSSMManagedInstanceCore"),
                    managed_policy_arn("AmazonSSMDirectoryServiceAccess")
                ],
                "Policies": [{
                    "PolicyName": "ad-management",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [
                            allow(
                                &["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
                                vec![admin_secret, domainless_secret]
                            ),
                            allow(&["ssm:GetParameter"], vec![cred_spec]),
                            allow(
                                &["ssm:SendCommand"],
                                vec![document_arn, sub("arn:${AWS::Partition}:ec2:${AWS::Region}:${AWS::AccountId}:instance/*")]
                            ),
                            allow(&["rds:DescribeDBInstances"], vec![json!("*")])
                        ]
                    }
                }]
            }),
        ),
    )?;
    b.add(
        "BastionInstanceProfile",
        Resource::new(
            "AWS::IAM::InstanceProfile",
            json!({ "Roles": [ref_to(ROLE)] }),
        ),
    )?;
    Ok(())
}

/// PowerShell that installs the directory and DNS tools and records the
/// endpoints an operator needs.
fn user_data(b: &mut StackBuilder, props: &BastionStackProps) -> Result<Value> {
    let directory_id = b.import(&props.ad_info.directory_id)?;
    let dns_ips = b.import(&props.ad_info.dns_ips)?;
    let db_address = b.import(&props.database_instance.endpoint_address)?;

    let script = "<powershell>\n\
        Install-WindowsFeature -Name RSAT-AD-Tools,RSAT-DNS-Server,GPMC -IncludeAllSubFeature\n\
        $info = @\"\n\
        Directory: ${DomainName} (${ShortName}, ${DirectoryId})\n\
        DNS: ${DnsIps}\n\
        SQL Server: ${DbAddress}\n\
        gMSA credential spec: ${CredSpec}\n\
        \"@\n\
        New-Item -ItemType Directory -Force -Path C:\\gmsa | Out-Null\n\
        Set-Content -Path C:\\gmsa\\endpoints.txt -Value $info\n\
        </powershell>";

    Ok(base64(sub_with(
        script,
        [
            ("DomainName", json!(props.ad_info.domain_name)),
            ("ShortName", json!(props.active_directory.short_name)),
            ("DirectoryId", directory_id),
            ("DnsIps", dns_ips),
            ("DbAddress", db_address),
            ("CredSpec", json!(props.cred_spec_parameter.name)),
        ],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::{
        DatabaseStack, DatabaseStackProps, InfrastructureStack, InfrastructureStackProps,
    };

    fn config() -> DeploymentConfig {
        DeploymentConfig {
            solution_id: String::from("demo"),
            ..DeploymentConfig::default()
        }
    }

    fn build(ip: &str) -> Result<(InfrastructureStack, DatabaseStack, BastionStack)> {
        let config = config();
        let infra = InfrastructureStack::new(
            &config,
            InfrastructureStackProps {
                ecs_instance_key_pair_name: String::from("kp-1"),
                domain_join_ecs_instances: true,
            },
        )?;
        let db = DatabaseStack::new(
            &config,
            DatabaseStackProps {
                vpc: Arc::clone(&infra.vpc),
                active_directory_id: infra.active_directory.alias.clone(),
                ecs_asg_security_group: Arc::clone(&infra.ecs_asg_security_group),
            },
        )?;
        let bastion = BastionStack::new(
            &config,
            BastionStackProps {
                vpc: Arc::clone(&infra.vpc),
                ad_info: Arc::clone(&infra.ad_info),
                ec2_instance_key_pair_name: String::from("kp-1"),
                my_sg_ingress_ip: ip.to_string(),
                active_directory: Arc::clone(&infra.active_directory),
                active_directory_admin_password_secret: Arc::clone(
                    &infra.active_directory_admin_password_secret,
                ),
                domain_join_ssm_document: Arc::clone(&infra.domain_join_ssm_document),
                ad_domain_join_tag_key: Arc::clone(&infra.ad_domain_join_tag_key),
                database_instance: Arc::clone(&db.database_instance),
                cred_spec_parameter: Arc::clone(&infra.cred_spec_parameter),
                domainless_identity_secret: Arc::clone(&infra.domainless_identity_secret),
            },
        )?;
        Ok((infra, db, bastion))
    }

    #[test]
    fn test_depends_on_infrastructure_and_database() {
        let (infra, db, bastion) = build("203.0.113.5/32").unwrap();
        let deps: Vec<&str> = bastion.dependencies().iter().map(String::as_str).collect();
        assert_eq!(deps, vec![db.stack_name(), infra.stack_name()]);
    }

    #[test]
    fn test_rdp_restricted_to_cidr() {
        let (_, _, bastion) = build("203.0.113.5/32").unwrap();
        let group = bastion.template().resource(SECURITY_GROUP).unwrap();
        let rules = group.properties["SecurityGroupIngress"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["CidrIp"], "203.0.113.5/32");
        assert_eq!(rules[0]["FromPort"], 3389);
    }

    #[test]
    fn test_bare_address_widened() {
        let (_, _, bastion) = build(" 198.51.100.7 ").unwrap();
        assert_eq!(bastion.ingress_cidr(), "198.51.100.7/32");
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(build("not-an-ip").is_err());
        assert!(build("10.0.0.0/40").is_err());
    }

    #[test]
    fn test_database_ingress_from_bastion() {
        let (_, _, bastion) = build("203.0.113.5/32").unwrap();
        let rule = bastion
            .template()
            .resource("DatabaseIngressFromBastion")
            .unwrap();
        assert_eq!(
            rule.properties["GroupId"],
            json!({"Fn::ImportValue": "demo-database:SqlServerSecurityGroupId"})
        );
        assert_eq!(rule.properties["FromPort"], 1433);
    }

    #[test]
    fn test_instance_tagged_for_domain_join() {
        let (_, _, bastion) = build("203.0.113.5/32").unwrap();
        let instance = bastion.template().resource(INSTANCE).unwrap();
        let tags = instance.properties["Tags"].as_array().unwrap();
        assert!(
            tags.iter()
                .any(|t| t["Key"] == "demo-domain-join" && t["Value"] == "true")
        );
        assert_eq!(instance.properties["KeyName"], "kp-1");
    }

    #[test]
    fn test_role_grants_secret_access() {
        let (_, _, bastion) = build("203.0.113.5/32").unwrap();
        let role = bastion.template().resource(ROLE).unwrap();
        let statements = &role.properties["Policies"][0]["PolicyDocument"]["Statement"];
        assert_eq!(
            statements[0]["Resource"][0],
            json!({"Fn::ImportValue": "demo-infrastructure:ActiveDirectoryAdminSecretArn"})
        );
        assert_eq!(statements[3]["Action"][0], "rds:DescribeDBInstances");
    }

    #[test]
    fn test_outputs_not_exported() {
        let (_, _, bastion) = build("203.0.113.5/32").unwrap();
        assert!(bastion.template().export_names().is_empty());
        assert!(bastion.template().output("BastionInstanceId").is_some());
    }

    #[test]
    fn test_shares_handles() {
        let (infra, db, bastion) = build("203.0.113.5/32").unwrap();
        assert!(Arc::ptr_eq(&bastion.props().vpc, &infra.vpc));
        assert!(Arc::ptr_eq(
            &bastion.props().database_instance,
            &db.database_instance
        ));
    }
}
