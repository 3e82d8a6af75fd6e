mod energy;
mod impute;
mod manifest;
mod matcher;
mod pipeline;
mod proximity;

pub use energy::{ConsumerCounts, EnergyFeatures, EnergySplit, EnergySplitApportioner, CONSUMPTION_COLUMNS, SPLIT_COLUMNS};
pub use impute::{ImputeReport, MissingValueCascade, GROUP_LEVELS, IDENTIFIER_COLUMNS};
pub use manifest::{ColumnManifest, FileHash, LOCATION_COLUMNS, SOLAR_COLUMNS};
pub use matcher::{ConstrainedNearestMatcher, MatchPair, Matching};
pub use pipeline::{FeatureFusionPipeline, FusionInputs, FusionOutput, FusionReport, PROXIMITY_COLUMN};
pub use proximity::ProximityAggregator;
