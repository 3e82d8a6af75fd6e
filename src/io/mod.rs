//! Reading input datasets and writing the fused outputs.
//!
//! - `tables` - delimited text tables, and Parquet behind the `parquet` feature
//! - `geojson` - GeoJSON polygon layers
//! - `shp` - ESRI shapefile polygon layers
//! - `wkt` - WKT rendering of output geometry columns
//! - `load` - all configured sources into pipeline inputs
//! - `write` - feature table, solar table and column manifest

mod geojson;
mod load;
mod shp;
mod tables;
mod wkt;
mod write;

pub use geojson::read_geojson;
pub use load::{load_inputs, read_addresses, read_polygon_layer};
pub use shp::read_shapefile;
pub use tables::{read_csv, write_csv, write_table};
#[cfg(feature = "parquet")]
pub use tables::write_parquet;
pub use write::{write_feature_table, write_outputs, write_solar_table, COORDINATES_COLUMN};
