//! I/O operations for reading and writing geospatial data

mod geojson_io;
mod native;

pub use geojson_io::{parse_vector_layer, read_vector_layer, vector_layer_to_string, write_vector_layer};
pub use native::{read_geotiff, write_geotiff, GeoTiffOptions, PixelType};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};
