//! Build-preparation pipeline for iOS-style application bundles.
//!
//! Synthesizes the complete app-icon set from one source raster, keeps the
//! icon catalog manifest consistent with it, patches the application
//! descriptor with feature-driven keys, and resolves signing credentials
//! into the identifiers the downstream compile/sign stage consumes. The
//! outcome of a run is a single [`ReadinessReport`].

pub mod backup;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod icons;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod signing;
pub mod transform;

pub use context::{ArtifactPaths, BuildContext};
pub use error::Error;
pub use pipeline::{Component, Pipeline};
pub use report::{ReadinessReport, ResolvedIdentifiers, UnmetSpec, Warning};

pub type Result<T> = std::result::Result<T, Error>;
