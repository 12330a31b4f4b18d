//! # Riparia Algorithms
//!
//! Geometry primitives and the riparian mask pipeline.
//!
//! ## Modules
//!
//! - **vector**: Validate, buffer, erase, dissolve, filter and measure geometries
//! - **rasterize**: Burn polygon layers onto a reference grid
//! - **engine**: The `GeometryEngine` seam used by the pipeline
//! - **riparian**: Configuration, variable-width stream buffers, layer
//!   composition and the run orchestrator

pub mod engine;
pub(crate) mod maybe_rayon;
pub mod rasterize;
pub mod riparian;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::{GeoEngine, GeometryEngine};
    pub use crate::rasterize::rasterize_layer;
    pub use crate::riparian::{
        assemble, CompositeMask, LayerCompositor, MissingWidthPolicy, Pipeline, PipelineInputs,
        RiparianConfig, RunOutput, WidthCalculator,
    };
    pub use crate::vector::{
        area, buffer_geometry, filter_layer, AreaAtLeast, AttributeIn, BufferParams, BufferSpec,
        FeaturePredicate, InvalidGeometryPolicy,
    };
    pub use riparia_core::prelude::*;
}
