//! Riparian mask pipeline
//!
//! One run takes the four input layers through the fixed stage sequence
//!
//! ```text
//! inputs -> shoreline -> water -> streams -> assemble -> rasterize
//! ```
//!
//! Each stage consumes the complete output of the ones before it. A
//! failing stage aborts the run; the error names the stage and, when
//! known, the offending feature. Every intermediate layer is kept as a
//! named artifact for the duration of the run.

use crate::engine::{GeoEngine, GeometryEngine};
use crate::riparian::assembler::{assemble, CompositeMask};
use crate::riparian::compositor::LayerCompositor;
use crate::riparian::config::RiparianConfig;
use riparia_core::io::write_vector_layer;
use riparia_core::raster::{ExtentMask, Raster, ReferenceGrid};
use riparia_core::vector::{GeometryKind, VectorLayer};
use riparia_core::{Error, Result, CRS};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The four source layers of a run
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub shoreline_a: VectorLayer,
    pub shoreline_b: VectorLayer,
    /// Lotic water and reservoirs, told apart by the water class field
    pub water: VectorLayer,
    /// Stream network carrying channel widths
    pub streams: VectorLayer,
}

/// Named intermediate layers, in the order they were produced
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    layers: Vec<VectorLayer>,
}

impl Artifacts {
    fn push(&mut self, layer: VectorLayer) {
        debug!("artifact {}: {} features", layer.name(), layer.len());
        self.layers.push(layer);
    }

    pub fn get(&self, name: &str) -> Option<&VectorLayer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VectorLayer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Write every artifact to `dir` as `<name>.geojson`
    pub fn write_geojson(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        self.layers
            .iter()
            .map(|layer| {
                let path = dir.join(format!("{}.geojson", layer.name()));
                write_vector_layer(layer, &path)?;
                Ok(path)
            })
            .collect()
    }
}

/// Everything one run produced
#[derive(Debug)]
pub struct RunOutput {
    pub artifacts: Artifacts,
    pub composite: CompositeMask,
    /// 1 for riparian cells, 0 elsewhere
    pub raster: Raster<u8>,
    /// Elapsed time per stage, in run order
    pub timings: Vec<(&'static str, Duration)>,
}

/// Runs the stage sequence with a fixed configuration and geometry engine
pub struct Pipeline<E: GeometryEngine = GeoEngine> {
    config: RiparianConfig,
    engine: E,
}

impl Pipeline<GeoEngine> {
    /// Pipeline with the `geo`-backed engine configured from `config`
    pub fn new(config: RiparianConfig) -> Result<Self> {
        config.validate()?;
        let engine = config.engine();
        Ok(Self { config, engine })
    }
}

impl<E: GeometryEngine> Pipeline<E> {
    pub fn with_engine(config: RiparianConfig, engine: E) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &RiparianConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Output grid: the reference grid resampled to the configured cell
    /// size, converted to the grid's units
    pub fn output_grid(&self, reference: &ReferenceGrid) -> Result<ReferenceGrid> {
        let mpu = match reference.crs() {
            Some(crs) => crs.meters_per_unit()?,
            None => self.config.working_crs()?.meters_per_unit()?,
        };
        reference.with_cell_size(self.config.cell_size_m / mpu)
    }

    fn check_inputs(&self, inputs: &PipelineInputs, reference: &ReferenceGrid) -> Result<CRS> {
        let working = self.config.working_crs()?;
        working.meters_per_unit()?;

        let expected = [
            (&inputs.shoreline_a, GeometryKind::Polygon),
            (&inputs.shoreline_b, GeometryKind::Polygon),
            (&inputs.water, GeometryKind::Polygon),
            (&inputs.streams, GeometryKind::Line),
        ];
        for (layer, kind) in expected {
            if layer.kind() != kind {
                return Err(Error::InvalidParameter {
                    name: "inputs",
                    value: layer.name().to_string(),
                    reason: format!("expected a {} layer, found {}", kind, layer.kind()),
                });
            }
            if !layer.crs().is_equivalent(&working) {
                return Err(Error::CrsMismatch(layer.crs().to_string(), working.to_string()));
            }
            debug!("{}: {} {} features", layer.name(), layer.len(), layer.kind());
        }

        if let Some(grid_crs) = reference.crs() {
            if !grid_crs.is_equivalent(&working) {
                return Err(Error::CrsMismatch(grid_crs.to_string(), working.to_string()));
            }
        }
        Ok(working)
    }

    /// Run every stage once over `inputs`.
    ///
    /// `reference` fixes the output origin and CRS; `extent`, when given,
    /// limits the computed window and zeroes cells outside it.
    pub fn run(
        &self,
        inputs: &PipelineInputs,
        reference: &ReferenceGrid,
        extent: Option<&ExtentMask>,
    ) -> Result<RunOutput> {
        let run_start = Instant::now();
        let mut timings = Vec::new();
        let mut artifacts = Artifacts::default();
        let compositor = LayerCompositor::new(&self.engine, &self.config);

        let grid = stage("inputs", &mut timings, || {
            self.check_inputs(inputs, reference)?;
            self.output_grid(reference)
        })?;

        let shoreline = stage("shoreline", &mut timings, || {
            compositor.shoreline(&inputs.shoreline_a, &inputs.shoreline_b)
        })?;
        let water = stage("water", &mut timings, || compositor.water(&inputs.water))?;
        let streams = stage("streams", &mut timings, || {
            compositor.streams(&inputs.streams, &shoreline.buffer, &water.buffer)
        })?;

        let composite = stage("assemble", &mut timings, || {
            assemble(&self.engine, &shoreline.riparian, &water.riparian, &streams.riparian)
        })?;

        let raster = stage("rasterize", &mut timings, || {
            self.engine.rasterize(composite.layer(), &grid, extent)
        })?;

        artifacts.push(shoreline.merged);
        artifacts.push(shoreline.buffer);
        artifacts.push(shoreline.riparian);
        artifacts.push(water.water);
        artifacts.push(water.buffer);
        artifacts.push(water.riparian);
        artifacts.push(streams.outside_shoreline);
        artifacts.push(streams.outside_water);
        artifacts.push(streams.riparian);
        artifacts.push(composite.layer().clone());

        info!(
            "run finished in {:.2}s: {}x{} output cells",
            run_start.elapsed().as_secs_f64(),
            raster.rows(),
            raster.cols()
        );

        Ok(RunOutput {
            artifacts,
            composite,
            raster,
            timings,
        })
    }
}

/// Run one named stage, recording its elapsed time and tagging any error
/// with the stage name
fn stage<T>(
    name: &'static str,
    timings: &mut Vec<(&'static str, Duration)>,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    info!("stage {}: started", name);
    let start = Instant::now();
    let result = f().map_err(|e| e.in_stage(name));
    let elapsed = start.elapsed();
    timings.push((name, elapsed));

    if result.is_ok() {
        info!("stage {}: done in {:.2}s", name, elapsed.as_secs_f64());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};
    use riparia_core::vector::{AttributeValue, Feature};
    use riparia_core::{ErrorKind, GeoTransform};

    fn albers(name: &str, kind: GeometryKind, features: Vec<Feature>) -> VectorLayer {
        VectorLayer::new(name, kind, CRS::conus_albers(), features).unwrap()
    }

    fn grid(rows: usize, cols: usize) -> ReferenceGrid {
        ReferenceGrid::new(
            GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0),
            rows,
            cols,
            Some(CRS::conus_albers()),
        )
        .unwrap()
    }

    fn inputs(streams: Vec<Feature>) -> PipelineInputs {
        PipelineInputs {
            shoreline_a: albers(
                "shoreline_a",
                GeometryKind::Polygon,
                vec![Feature::new(polygon![
                    (x: 100.0, y: 100.0), (x: 200.0, y: 100.0), (x: 200.0, y: 200.0), (x: 100.0, y: 200.0),
                ])],
            ),
            shoreline_b: albers("shoreline_b", GeometryKind::Polygon, vec![]),
            water: albers("water", GeometryKind::Polygon, vec![]),
            streams: albers("streams", GeometryKind::Line, streams),
        }
    }

    #[test]
    fn test_run_records_everything() {
        let pipeline = Pipeline::new(RiparianConfig::default()).unwrap();
        let output = pipeline.run(&inputs(vec![]), &grid(40, 40), None).unwrap();

        let stages: Vec<_> = output.timings.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, ["inputs", "shoreline", "water", "streams", "assemble", "rasterize"]);

        let names: Vec<_> = output.artifacts.iter().map(|l| l.name()).collect();
        assert_eq!(
            names,
            [
                "shoreline",
                "shoreline_buffer",
                "shoreline_riparian",
                "water",
                "water_buffer",
                "water_riparian",
                "streams_shoreline_erase",
                "streams_water_erase",
                "stream_riparian",
                "riparian_vector",
            ]
        );
        assert_eq!(output.raster.shape(), (40, 40));

        // The shoreline itself is not riparian, the ring around it is
        assert_eq!(output.raster.value_at(150.0, 150.0), Some(0));
        assert_eq!(output.raster.value_at(215.0, 150.0), Some(1));
        assert_eq!(output.raster.value_at(245.0, 150.0), Some(0));
    }

    #[test]
    fn test_stage_error_names_stage_and_feature() {
        let pipeline = Pipeline::new(RiparianConfig::default()).unwrap();
        let streams = vec![Feature::new(line_string![(x: 300.0, y: 300.0), (x: 350.0, y: 300.0)]).with_id("facet-17")];

        let err = pipeline.run(&inputs(streams), &grid(40, 40), None).unwrap_err();
        assert_eq!(err.stage(), Some("streams"));
        assert_eq!(err.kind(), ErrorKind::MissingAttribute);
        assert!(err.to_string().contains("facet-17"), "{err}");
    }

    #[test]
    fn test_wrong_layer_kind_fails_in_inputs() {
        let pipeline = Pipeline::new(RiparianConfig::default()).unwrap();
        let mut bad = inputs(vec![]);
        bad.streams = albers("streams", GeometryKind::Polygon, vec![]);

        let err = pipeline.run(&bad, &grid(10, 10), None).unwrap_err();
        assert_eq!(err.stage(), Some("inputs"));
    }

    #[test]
    fn test_grid_crs_must_match() {
        let pipeline = Pipeline::new(RiparianConfig::default()).unwrap();
        let other = ReferenceGrid::new(GeoTransform::new(0.0, 100.0, 10.0, -10.0), 10, 10, Some(CRS::from_epsg(32618))).unwrap();

        let err = pipeline.run(&inputs(vec![]), &other, None).unwrap_err();
        assert_eq!(err.stage(), Some("inputs"));
        assert!(matches!(err, Error::Stage { ref source, .. } if matches!(**source, Error::CrsMismatch(..))));
    }

    #[test]
    fn test_output_grid_coarsens() {
        let config = RiparianConfig {
            cell_size_m: 20.0,
            ..RiparianConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let out = pipeline.output_grid(&grid(41, 40)).unwrap();
        assert_eq!(out.shape(), (21, 20));
        assert_eq!(out.cell_size(), 20.0);

        let misaligned = RiparianConfig {
            cell_size_m: 15.0,
            ..RiparianConfig::default()
        };
        let err = Pipeline::new(misaligned).unwrap().output_grid(&grid(10, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GridMisalignment);
    }

    #[test]
    fn test_write_artifacts() {
        let pipeline = Pipeline::new(RiparianConfig::default()).unwrap();
        let streams = vec![Feature::new(line_string![(x: 300.0, y: 50.0), (x: 350.0, y: 50.0)])
            .with_property("channel_width", AttributeValue::Float(4.0))];
        let output = pipeline.run(&inputs(streams), &grid(40, 40), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = output.artifacts.write_geojson(&dir.path().join("intermediates")).unwrap();
        assert_eq!(written.len(), 10);
        assert!(written.iter().all(|p| p.exists()));
        assert!(dir.path().join("intermediates/stream_riparian.geojson").exists());
    }
}
