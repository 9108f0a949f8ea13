//! CloudFormation template model.
//!
//! Stacks declare their resources into a [`Template`], which renders to the
//! JSON document handed to the deployment engine.

pub mod intrinsic;
mod model;

pub use model::{Export, FORMAT_VERSION, Output, Parameter, Resource, Template};
