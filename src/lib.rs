// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # gmsa-stacks
//!
//! Synthesizes the CloudFormation stacks of a Windows workload that reaches
//! SQL Server on Amazon RDS through a group managed service account (gMSA).
//!
//! ## Overview
//!
//! Four stacks are declared and deployed in a fixed order:
//!
//! 1. **Infrastructure**: VPC, AWS Managed Microsoft AD, secrets, the gMSA
//!    credential spec, the domain-join document and the ECS Windows capacity
//! 2. **Database**: SQL Server on RDS joined to the directory
//! 3. **Bastion**: a Windows instance for administering the directory and the database
//! 4. **Application**: the ECS task definition and, optionally, its service
//!
//! Later stacks receive typed handles from earlier ones and resolve them as
//! CloudFormation imports, so the deployment order follows from the templates.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`template`]: CloudFormation template model
//! - [`stacks`]: The four stacks and their cross-stack handles
//! - [`composer`]: Required-setting check and stack construction
//! - [`assembly`]: Templates and manifest written for the deployment engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```no_run
//! use gmsa_stacks::{AssemblyWriter, CloudAssembly, Composer, ConfigLoader};
//!
//! # fn main() -> gmsa_stacks::Result<()> {
//! let config = ConfigLoader::new().load()?;
//! let app = Composer::new(&config).compose()?;
//! AssemblyWriter::default().write(&CloudAssembly::try_from(&app)?)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod assembly;
pub mod cli;
pub mod composer;
pub mod config;
pub mod error;
pub mod stacks;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use assembly::{AssemblyWriter, CloudAssembly, Manifest};
pub use cli::{Cli, Commands, OutputFormatter};
pub use composer::{ComposedApp, Composer, NoopObserver, SynthesisObserver};
pub use config::{ConfigLoader, ConfigValidator, DeploymentConfig, StackKind};
pub use error::{ConfigError, RequiredField, Result, SynthError};
pub use stacks::{
    ApplicationStack, BastionStack, DatabaseStack, InfrastructureStack, Stack,
};
