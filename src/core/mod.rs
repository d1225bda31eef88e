//! Core data model: manifests, packages, the build model, and the target DAG.

pub mod error;
pub mod manifest;
pub mod model;
pub mod package;
pub mod target;

pub use error::Error;
pub use manifest::Manifest;
pub use model::BuildModel;
pub use package::Package;
pub use target::{Target, TargetId, TargetKind};
