//! ECS application tier running under the group managed service account.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::config::{DeploymentConfig, StackKind};
use crate::error::Result;
use crate::template::Resource;
use crate::template::intrinsic::{
    allow, assume_role_policy, get_att, join, managed_policy_arn, ref_to, sub,
};

use super::builder::{Stack, StackBuilder, StackDefinition};
use super::handles::{
    DatabaseInstance, EcsCluster, Secret, SecurityGroup, StringParameter, Vpc, import_all,
};

const TASK_DEFINITION: &str = "AppTaskDefinition";
const SERVICE: &str = "AppService";
const LOG_GROUP: &str = "AppLogGroup";
const EXECUTION_ROLE: &str = "AppTaskExecutionRole";
const TASK_ROLE: &str = "AppTaskRole";
const CONTAINER_NAME: &str = "web";
const CONTAINER_PORT: u16 = 80;

/// Inputs of the application stack.
#[derive(Debug, Clone)]
pub struct ApplicationStackProps {
    /// The shared VPC.
    pub vpc: Arc<Vpc>,
    /// Security group of the ECS hosts, also attached to tasks.
    pub ecs_asg_security_group: Arc<SecurityGroup>,
    /// Whether the ECS hosts are joined to the directory.
    pub domain_join_ecs_instances: bool,
    /// Fully qualified domain name of the directory.
    pub directory_name: String,
    /// The SQL Server instance the application connects to.
    pub database_instance: Arc<DatabaseInstance>,
    /// Parameter holding the gMSA credential spec.
    pub cred_spec_parameter: Arc<StringParameter>,
    /// Credentials of the domainless gMSA identity.
    pub domainless_identity_secret: Arc<Secret>,
    /// Task definition revision the service runs; the revision declared
    /// here when unset.
    pub app_td_revision: Option<String>,
    /// Whether the ECS service is declared.
    pub deploy_app: bool,
    /// The ECS cluster.
    pub ecs_cluster: Arc<EcsCluster>,
    /// Container image.
    pub image: String,
}

/// Task definition and optional service.
#[derive(Debug)]
pub struct ApplicationStack {
    definition: StackDefinition,
    props: ApplicationStackProps,
    task_family: String,
}

impl ApplicationStack {
    /// Builds the application stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be assembled.
    pub fn new(config: &DeploymentConfig, props: ApplicationStackProps) -> Result<Self> {
        let mut b = StackBuilder::new(
            StackKind::Application,
            config,
            "ECS Windows application authenticating to SQL Server with a gMSA",
        );
        let task_family = b.physical_name("web");

        let cred_spec_arn = b.import(&props.cred_spec_parameter.arn)?;
        let secret_arn = b.import(&props.domainless_identity_secret.arn)?;
        let db_address = b.import(&props.database_instance.endpoint_address)?;
        let db_port = b.import(&props.database_instance.endpoint_port)?;

        b.add(
            LOG_GROUP,
            Resource::new(
                "AWS::Logs::LogGroup",
                json!({
                    "LogGroupName": format!("/ecs/{task_family}"),
                    "RetentionInDays": 30
                }),
            ),
        )?;

        b.add(
            EXECUTION_ROLE,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com"),
                    "ManagedPolicyArns": [
                        managed_policy_arn("service-role/AmazonECSTaskExecutionRolePolicy")
                    ],
                    "Policies": [{
                        "PolicyName": "gmsa-credential-spec",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                allow(&["secretsmanager:GetSecretValue"], vec![secret_arn]),
                                allow(&["ssm:GetParameter", "ssm:GetParameters"], vec![cred_spec_arn.clone()])
                            ]
                        }
                    }]
                }),
            ),
        )?;
        b.add(
            TASK_ROLE,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com")
                }),
            ),
        )?;

        let credential_spec = credential_spec(props.domain_join_ecs_instances, cred_spec_arn);
        let sql_host = format!(
            "{}.{}",
            props.database_instance.identifier, props.directory_name
        );

        b.add(
            TASK_DEFINITION,
            Resource::new(
                "AWS::ECS::TaskDefinition",
                json!({
                    "Family": task_family,
                    "RequiresCompatibilities": ["EC2"],
                    "NetworkMode": "awsvpc",
                    "Cpu": "1024",
                    "Memory": "2048",
                    "ExecutionRoleArn": get_att(EXECUTION_ROLE, "Arn"),
                    "TaskRoleArn": get_att(TASK_ROLE, "Arn"),
                    "RuntimePlatform": {
                        "OperatingSystemFamily": "WINDOWS_SERVER_2022_CORE",
                        "CpuArchitecture": "X86_64"
                    },
                    "ContainerDefinitions": [{
                        "Name": CONTAINER_NAME,
                        "Image": props.image,
                        "Essential": true,
                        "PortMappings": [{ "ContainerPort": CONTAINER_PORT, "Protocol": "tcp" }],
                        "CredentialSpecs": [credential_spec],
                        "Environment": [
                            { "Name": "SQL_SERVER_HOST", "Value": sql_host },
                            { "Name": "SQL_SERVER_ENDPOINT", "Value": db_address },
                            {
                                "Name": "ConnectionStrings__Default",
                                "Value": connection_string(&sql_host)
                            },
                            { "Name": "SQL_SERVER_PORT", "Value": db_port }
                        ],
                        "LogConfiguration": {
                            "LogDriver": "awslogs",
                            "Options": {
                                "awslogs-group": ref_to(LOG_GROUP),
                                "awslogs-region": ref_to("AWS::Region"),
                                "awslogs-stream-prefix": CONTAINER_NAME
                            }
                        }
                    }]
                }),
            ),
        )?;
        b.output("TaskDefinitionArn", ref_to(TASK_DEFINITION), "Task definition ARN")?;

        if props.deploy_app {
            declare_service(&mut b, &props, &task_family)?;
        }

        let definition = b.finish();
        info!(
            "Built stack {} ({} resources, service {})",
            definition.name,
            definition.template.resources().len(),
            if props.deploy_app { "declared" } else { "skipped" }
        );

        Ok(Self {
            definition,
            props,
            task_family,
        })
    }

    /// Inputs this stack was built from.
    #[must_use]
    pub const fn props(&self) -> &ApplicationStackProps {
        &self.props
    }

    /// Task definition family.
    #[must_use]
    pub fn task_family(&self) -> &str {
        &self.task_family
    }

    /// Task definition the service is pinned to, if a service is declared.
    #[must_use]
    pub fn service_task_definition(&self) -> Option<&Value> {
        self.template()
            .resource(SERVICE)
            .and_then(|service| service.property("TaskDefinition"))
    }
}

impl Stack for ApplicationStack {
    fn definition(&self) -> &StackDefinition {
        &self.definition
    }
}

/// Domain-joined hosts fetch the credential spec directly; otherwise the
/// domainless plugin retrieves the gMSA password with the identity secret.
fn credential_spec(domain_joined: bool, parameter_arn: Value) -> Value {
    let prefix = if domain_joined {
        "credentialspec:"
    } else {
        "credentialspecdomainless:"
    };
    join("", vec![json!(prefix), parameter_arn])
}

fn connection_string(sql_host: &str) -> String {
    format!(
        "Server={sql_host};Database=master;Integrated Security=true;TrustServerCertificate=true"
    )
}

/// Revision ARN of `family`. The configured values stay literal join parts
/// so they are never parsed as `Fn::Sub` placeholders.
fn task_definition_arn(family: &str, revision: &str) -> Value {
    join(
        "",
        vec![
            sub("arn:${AWS::Partition}:ecs:${AWS::Region}:${AWS::AccountId}:task-definition/"),
            json!(format!("{family}:{revision}")),
        ],
    )
}

fn declare_service(
    b: &mut StackBuilder,
    props: &ApplicationStackProps,
    task_family: &str,
) -> Result<()> {
    let cluster = b.import(&props.ecs_cluster.cluster_name)?;
    let capacity_provider = b.import(&props.ecs_cluster.capacity_provider)?;
    let subnets = import_all(b, &props.vpc.private_subnet_ids)?;
    let security_group = b.import(&props.ecs_asg_security_group.group_id)?;

    let task_definition = props.app_td_revision.as_deref().map_or_else(
        || ref_to(TASK_DEFINITION),
        |revision| task_definition_arn(task_family, revision),
    );

    b.add(
        SERVICE,
        Resource::new(
            "AWS::ECS::Service",
            json!({
                "ServiceName": b.physical_name("web"),
                "Cluster": cluster,
                "TaskDefinition": task_definition,
                "DesiredCount": 1,
                "CapacityProviderStrategy": [{ "CapacityProvider": capacity_provider, "Weight": 1 }],
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "Subnets": subnets,
                        "SecurityGroups": [security_group],
                        "AssignPublicIp": "DISABLED"
                    }
                }
            }),
        )
        .depends_on(TASK_DEFINITION),
    )?;
    b.output("ServiceName", get_att(SERVICE, "Name"), "ECS service name")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::{
        DatabaseStack, DatabaseStackProps, InfrastructureStack, InfrastructureStackProps,
    };

    struct Built {
        infra: InfrastructureStack,
        db: DatabaseStack,
        app: ApplicationStack,
    }

    fn build(domain_join: bool, deploy: bool, revision: Option<&str>) -> Built {
        let config = DeploymentConfig {
            solution_id: String::from("demo"),
            ..DeploymentConfig::default()
        };
        let infra = InfrastructureStack::new(
            &config,
            InfrastructureStackProps {
                ecs_instance_key_pair_name: String::from("kp-1"),
                domain_join_ecs_instances: domain_join,
            },
        )
        .unwrap();
        let db = DatabaseStack::new(
            &config,
            DatabaseStackProps {
                vpc: Arc::clone(&infra.vpc),
                active_directory_id: infra.active_directory.alias.clone(),
                ecs_asg_security_group: Arc::clone(&infra.ecs_asg_security_group),
            },
        )
        .unwrap();
        let app = ApplicationStack::new(
            &config,
            ApplicationStackProps {
                vpc: Arc::clone(&infra.vpc),
                ecs_asg_security_group: Arc::clone(&infra.ecs_asg_security_group),
                domain_join_ecs_instances: domain_join,
                directory_name: infra.active_directory.name.clone(),
                database_instance: Arc::clone(&db.database_instance),
                cred_spec_parameter: Arc::clone(&infra.cred_spec_parameter),
                domainless_identity_secret: Arc::clone(&infra.domainless_identity_secret),
                app_td_revision: revision.map(String::from),
                deploy_app: deploy,
                ecs_cluster: Arc::clone(&infra.ecs_cluster),
                image: config.app_image.clone(),
            },
        )
        .unwrap();
        Built { infra, db, app }
    }

    fn container(app: &ApplicationStack) -> &Value {
        &app.template()
            .resource(TASK_DEFINITION)
            .unwrap()
            .properties["ContainerDefinitions"][0]
    }

    #[test]
    fn test_credential_spec_prefix() {
        let joined = build(true, false, None);
        assert_eq!(
            container(&joined.app)["CredentialSpecs"][0]["Fn::Join"][1][0],
            "credentialspec:"
        );

        let domainless = build(false, false, None);
        assert_eq!(
            container(&domainless.app)["CredentialSpecs"][0]["Fn::Join"][1][0],
            "credentialspecdomainless:"
        );
    }

    #[test]
    fn test_sql_host_uses_directory_name() {
        let built = build(false, false, None);
        let env = container(&built.app)["Environment"].as_array().unwrap();
        assert_eq!(env[0]["Value"], "demo-sqlserver.directory.gmsa.local");
        assert!(
            env[2]["Value"]
                .as_str()
                .unwrap()
                .contains("Integrated Security=true")
        );
        assert_eq!(env[3]["Name"], "SQL_SERVER_PORT");
        assert_eq!(
            env[3]["Value"],
            json!({"Fn::ImportValue": "demo-database:SqlServerEndpointPort"})
        );
    }

    #[test]
    fn test_no_service_without_deploy() {
        let built = build(false, false, Some("3"));
        assert!(built.app.template().resource(SERVICE).is_none());
        assert!(built.app.service_task_definition().is_none());
    }

    #[test]
    fn test_service_pinned_to_revision() {
        let built = build(false, true, Some("7"));
        let pinned = built.app.service_task_definition().unwrap();
        let parts = &pinned["Fn::Join"][1];
        assert!(parts[0]["Fn::Sub"].as_str().unwrap().ends_with(":task-definition/"));
        assert_eq!(parts[1], "demo-web:7");
    }

    #[test]
    fn test_revision_kept_literal() {
        let built = build(false, true, Some("${AWS::NoValue}"));
        let parts = &built.app.service_task_definition().unwrap()["Fn::Join"][1];
        assert_eq!(parts[1], "demo-web:${AWS::NoValue}");
        assert!(!parts[0]["Fn::Sub"].as_str().unwrap().contains("NoValue"));
    }

    #[test]
    fn test_service_uses_local_definition_without_revision() {
        let built = build(false, true, None);
        assert_eq!(
            built.app.service_task_definition().unwrap(),
            &json!({"Ref": TASK_DEFINITION})
        );
    }

    #[test]
    fn test_dependencies() {
        let built = build(false, true, None);
        let deps: Vec<&str> = built.app.dependencies().iter().map(String::as_str).collect();
        assert_eq!(deps, vec![built.db.stack_name(), built.infra.stack_name()]);
    }

    #[test]
    fn test_shares_handles() {
        let built = build(false, false, None);
        assert!(Arc::ptr_eq(&built.app.props().vpc, &built.infra.vpc));
        assert!(Arc::ptr_eq(
            &built.app.props().ecs_cluster,
            &built.infra.ecs_cluster
        ));
        assert_eq!(built.app.task_family(), "demo-web");
    }
}
