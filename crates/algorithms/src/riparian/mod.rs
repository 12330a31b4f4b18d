//! Riparian mask pipeline
//!
//! - Config: run settings, loadable from TOML
//! - Width: per-stream buffer distances from channel widths
//! - Compositor: the shoreline, water and stream intermediate layers
//! - Assembler: the composite mask
//! - Pipeline: stage sequencing, artifacts and timings

mod assembler;
mod compositor;
mod config;
mod pipeline;
mod width;

pub use assembler::{assemble, vector_mask_path, CompositeMask};
pub use compositor::{LayerCompositor, ShorelineLayers, StreamLayers, WaterLayers};
pub use config::{MissingWidthPolicy, RiparianConfig};
pub use pipeline::{Artifacts, Pipeline, PipelineInputs, RunOutput};
pub use width::{ResolvedWidths, WidthCalculator};
