#![doc = "EcoMapper: fuses civic datasets into one feature row per address and selects energy communities from the result"]
mod common;
mod community;
mod config;
mod fusion;
mod geom;
mod io;
mod join;
mod landuse;
mod layer;
mod table;

#[doc(inline)]
pub use community::{Comparator, CommunitySelector, Criteria, Criterion, Threshold};

#[doc(inline)]
pub use config::{AddressSource, Config, EnergyPrice, FusionParams, LayerSource, OutputPaths, SourcePaths, TableSource};

#[doc(inline)]
pub use fusion::{
    ColumnManifest, ConstrainedNearestMatcher, ConsumerCounts, EnergyFeatures, EnergySplit,
    EnergySplitApportioner, FeatureFusionPipeline, FileHash, FusionInputs, FusionOutput,
    FusionReport, ImputeReport, MatchPair, Matching, MissingValueCascade, ProximityAggregator,
    CONSUMPTION_COLUMNS, GROUP_LEVELS, IDENTIFIER_COLUMNS, LOCATION_COLUMNS, PROXIMITY_COLUMN,
    SOLAR_COLUMNS, SPLIT_COLUMNS,
};

#[doc(inline)]
pub use geom::{Buffer, Crs, PointSet, Polygons, Projector};

#[doc(inline)]
pub use io::{
    load_inputs, read_addresses, read_csv, read_geojson, read_polygon_layer, read_shapefile, write_csv,
    write_feature_table, write_outputs, write_solar_table, write_table, COORDINATES_COLUMN,
};

#[doc(inline)]
pub use join::{attach_covering, join_on, JoinKind};

#[doc(inline)]
pub use landuse::LandUseClass;

#[doc(inline)]
pub use layer::{PolygonLayer, SolarLayer};

#[doc(inline)]
pub use table::FeatureTable;
