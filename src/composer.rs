//! Stack composition.
//!
//! The composer checks the two required settings, then builds the four
//! stacks in their fixed order, handing each one the handles produced by
//! the stacks before it.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ConfigValidator, DeploymentConfig, StackKind};
use crate::error::Result;
use crate::stacks::{
    ApplicationStack, ApplicationStackProps, BastionStack, BastionStackProps, DatabaseStack,
    DatabaseStackProps, InfrastructureStack, InfrastructureStackProps, Stack,
};

/// Receives composition progress.
#[cfg_attr(test, mockall::automock)]
pub trait SynthesisObserver {
    /// Called once after each stack is constructed.
    fn on_stack_constructed(&mut self, kind: StackKind, stack_name: &str);

    /// Called for each advisory warning.
    fn on_warning(&mut self, message: &str);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SynthesisObserver for NoopObserver {
    fn on_stack_constructed(&mut self, _kind: StackKind, _stack_name: &str) {}

    fn on_warning(&mut self, _message: &str) {}
}

/// The four constructed stacks.
#[derive(Debug)]
pub struct ComposedApp {
    /// Network, directory and shared compute.
    pub infrastructure: InfrastructureStack,
    /// SQL Server.
    pub database: DatabaseStack,
    /// AD management instance.
    pub bastion: BastionStack,
    /// ECS application tier.
    pub application: ApplicationStack,
    /// Advisory warnings raised during composition.
    pub warnings: Vec<String>,
}

impl ComposedApp {
    /// Stacks in construction order.
    #[must_use]
    pub fn stacks(&self) -> [&dyn Stack; 4] {
        [
            &self.infrastructure,
            &self.database,
            &self.bastion,
            &self.application,
        ]
    }

    /// Stack names in construction order.
    #[must_use]
    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks().into_iter().map(|stack| stack.stack_name()).collect()
    }
}

/// Advisory shown when the ECS service is declared.
#[must_use]
pub fn task_revision_warning(config: &DeploymentConfig) -> Option<String> {
    config.deploy_app.then(|| {
        format!(
            "Revision \"{}\" of the Amazon ECS task definition is being used in the Amazon ECS service. \
             If you want a different revision, set the APP_TD_REVISION environment variable to a different value.",
            config.task_revision_label()
        )
    })
}

/// Builds the stacks of one deployment.
pub struct Composer<'a> {
    config: &'a DeploymentConfig,
    observer: Option<&'a mut dyn SynthesisObserver>,
    validator: ConfigValidator,
}

impl<'a> Composer<'a> {
    /// Creates a composer for `config`.
    #[must_use]
    pub const fn new(config: &'a DeploymentConfig) -> Self {
        Self {
            config,
            observer: None,
            validator: ConfigValidator::new(),
        }
    }

    /// Reports progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a mut dyn SynthesisObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Checks the required settings and builds all four stacks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`](crate::error::ConfigError::MissingRequired)
    /// before any stack is built if the key pair or ingress address is
    /// empty, [`ConfigError::InvalidValue`](crate::error::ConfigError::InvalidValue)
    /// if the ingress address is malformed, or an error from stack
    /// construction.
    pub fn compose(mut self) -> Result<ComposedApp> {
        self.validator.check_required(self.config)?;
        let config = self.config;

        info!("Composing stacks for solution {}", config.solution_id);

        let infrastructure = InfrastructureStack::new(
            config,
            InfrastructureStackProps {
                ecs_instance_key_pair_name: config.ec2_instance_keypair_name.clone(),
                domain_join_ecs_instances: config.domain_join_ecs,
            },
        )?;
        self.constructed(&infrastructure);

        let database = DatabaseStack::new(
            config,
            DatabaseStackProps {
                vpc: Arc::clone(&infrastructure.vpc),
                active_directory_id: infrastructure.active_directory.alias.clone(),
                ecs_asg_security_group: Arc::clone(&infrastructure.ecs_asg_security_group),
            },
        )?;
        self.constructed(&database);

        let bastion = BastionStack::new(
            config,
            BastionStackProps {
                vpc: Arc::clone(&infrastructure.vpc),
                ad_info: Arc::clone(&infrastructure.ad_info),
                ec2_instance_key_pair_name: config.ec2_instance_keypair_name.clone(),
                my_sg_ingress_ip: config.my_sg_ingress_ip.clone(),
                active_directory: Arc::clone(&infrastructure.active_directory),
                active_directory_admin_password_secret: Arc::clone(
                    &infrastructure.active_directory_admin_password_secret,
                ),
                domain_join_ssm_document: Arc::clone(&infrastructure.domain_join_ssm_document),
                ad_domain_join_tag_key: Arc::clone(&infrastructure.ad_domain_join_tag_key),
                database_instance: Arc::clone(&database.database_instance),
                cred_spec_parameter: Arc::clone(&infrastructure.cred_spec_parameter),
                domainless_identity_secret: Arc::clone(&infrastructure.domainless_identity_secret),
            },
        )?;
        self.constructed(&bastion);

        let mut warnings = Vec::new();
        if let Some(message) = task_revision_warning(config) {
            warn!("{message}");
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.on_warning(&message);
            }
            warnings.push(message);
        }

        let application = ApplicationStack::new(
            config,
            ApplicationStackProps {
                vpc: Arc::clone(&infrastructure.vpc),
                ecs_asg_security_group: Arc::clone(&infrastructure.ecs_asg_security_group),
                domain_join_ecs_instances: config.domain_join_ecs,
                directory_name: infrastructure.active_directory.name.clone(),
                database_instance: Arc::clone(&database.database_instance),
                cred_spec_parameter: Arc::clone(&infrastructure.cred_spec_parameter),
                domainless_identity_secret: Arc::clone(&infrastructure.domainless_identity_secret),
                app_td_revision: config.app_td_revision.clone(),
                deploy_app: config.deploy_app,
                ecs_cluster: Arc::clone(&infrastructure.ecs_cluster),
                image: config.app_image.clone(),
            },
        )?;
        self.constructed(&application);

        Ok(ComposedApp {
            infrastructure,
            database,
            bastion,
            application,
            warnings,
        })
    }

    fn constructed(&mut self, stack: &dyn Stack) {
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.on_stack_constructed(stack.kind(), stack.stack_name());
        }
    }
}
