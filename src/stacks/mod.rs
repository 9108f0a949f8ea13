//! The four CloudFormation stacks.
//!
//! Each stack is built once from a props struct holding the handles of
//! earlier stacks. Construction order is Infrastructure, Database, Bastion,
//! Application; a stack can only import what an earlier one exported.

mod application;
mod bastion;
mod builder;
mod database;
mod handles;
mod infrastructure;

pub use application::{ApplicationStack, ApplicationStackProps};
pub use bastion::{BastionStack, BastionStackProps, RDP_PORT};
pub use builder::{Stack, StackBuilder, StackDefinition};
pub use database::{DatabaseStack, DatabaseStackProps, SQL_SERVER_PORT};
pub use handles::{
    ActiveDirectory, AdInfo, DatabaseInstance, DomainJoinTag, EcsCluster, ExportedValue, Secret,
    SecurityGroup, SsmDocument, StringParameter, Vpc,
};
pub use infrastructure::{InfrastructureStack, InfrastructureStackProps};
