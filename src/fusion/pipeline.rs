use anyhow::Result;
use log::{info, warn};
use polars::prelude::*;

use crate::{
    common::{f64_values, filter_rows, has_column, set_f64, set_str, str_values},
    config::FusionParams,
    geom::{Crs, Projector},
    join::{attach_covering, join_on, JoinKind},
    landuse::LandUseClass,
    layer::{PolygonLayer, SolarLayer},
    table::FeatureTable,
};

use super::{
    energy::EnergyFeatures,
    impute::{ImputeReport, MissingValueCascade},
    matcher::{ConstrainedNearestMatcher, Matching},
    proximity::ProximityAggregator,
};

/// Name of the proximity feature column.
pub const PROXIMITY_COLUMN: &str = "top_10_per_energy_prod_in_500m";

/// Every dataset the pipeline fuses, already normalised to WGS84.
#[derive(Debug, Clone)]
pub struct FusionInputs {
    /// Sector polygons with a `sector_code` attribute.
    pub sectors: PolygonLayer,
    /// Tables keyed by `sector_code`, left-joined onto the sectors in order.
    pub sector_tables: Vec<DataFrame>,
    /// Address table with `lat`/`lon`, `streetname` and `postcode`.
    pub addresses: DataFrame,
    /// Tables keyed by `postcode`.
    pub postcode_tables: Vec<DataFrame>,
    /// Street consumption keyed by `street`.
    pub street_consumption: Option<DataFrame>,
    /// Land-use polygons with an `item2012` category.
    pub land_use: Option<PolygonLayer>,
    pub solar: SolarLayer,
}

/// Counts gathered while fusing, for logging and the CLI summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FusionReport {
    pub addresses: usize,
    pub outside_sectors: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub impute: ImputeReport,
}

#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub features: FeatureTable,
    /// Solar layer with `lat_solar`/`lon_solar` added.
    pub solar: SolarLayer,
    pub matching: Matching,
    /// Metric CRS used for every distance predicate; None when no address
    /// survived the sector join.
    pub metric_crs: Option<Crs>,
    pub report: FusionReport,
}

/// Fuses the civic datasets into one row per address.
#[derive(Debug, Clone)]
pub struct FeatureFusionPipeline {
    params: FusionParams,
}

impl FeatureFusionPipeline {
    pub fn new(params: FusionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    #[inline] pub fn params(&self) -> &FusionParams { &self.params }

    pub fn run(&self, inputs: FusionInputs) -> Result<FusionOutput> {
        let FusionInputs { sectors, sector_tables, addresses, postcode_tables, street_consumption, land_use, mut solar } = inputs;
        let mut report = FusionReport::default();

        // 1. sector-level attributes
        let mut sector_data = sectors.data().clone();
        for table in &sector_tables {
            sector_data = join_on(&sector_data, table, "sector_code", "sector_code", JoinKind::Left)?;
        }
        let sectors = sectors.with_data(sector_data)?;

        // 2. addresses inside a sector
        let table = FeatureTable::from_addresses(addresses)?;
        report.addresses = table.height();
        let points = table.coordinates()?;
        let df = attach_covering(table.data(), &points, &sectors, "sector_code", "sector_code")?;
        let inside = str_values(&df, "sector_code")?.iter().map(Option::is_some).collect::<Vec<_>>();
        report.outside_sectors = inside.iter().filter(|&&inside| !inside).count();
        if report.outside_sectors > 0 {
            warn!("[fusion::pipeline] dropped {} of {} addresses outside every sector",
                report.outside_sectors, report.addresses);
        }
        let df = filter_rows(&df, &inside)?;
        let mut df = join_on(&df, sectors.data(), "sector_code", "sector_code", JoinKind::Left)?;

        // 3. postcode and street attributes
        for table in &postcode_tables {
            df = join_on(&df, table, "postcode", "postcode", JoinKind::Left)?;
        }
        if let Some(streets) = &street_consumption {
            df = join_on(&df, streets, "streetname", "street", JoinKind::Left)?;
        }

        let table = FeatureTable::new(df)?;
        let points = table.coordinates()?;
        let mut df = table.into_data();

        // 4. land use
        match &land_use {
            Some(layer) => df = attach_covering(&df, &points, layer, "item2012", "item2012")?,
            None => warn!("[fusion::pipeline] no land-use layer, every address is unclassified"),
        }
        let classes = if has_column(&df, "item2012") {
            str_values(&df, "item2012")?.iter()
                .map(|item| Some(LandUseClass::classify(item.as_deref()).as_str().to_string()))
                .collect()
        } else {
            vec![Some(LandUseClass::Unclassified.as_str().to_string()); df.height()]
        };
        set_str(&mut df, "land_use_type", classes)?;

        // 5. constrained nearest matching in one shared metric CRS
        // 6. production of nearby top sites
        let (matching, metric_crs, proximity) = match points.center() {
            Some(center) => {
                let metric_crs = Crs::utm_for(center);
                let to_metric = Projector::new(Crs::Wgs84, metric_crs.clone())?;
                info!("[fusion::pipeline] measuring distances in {metric_crs}");

                solar.locate(&to_metric)?;
                let addresses_m = points.project(&to_metric)?;
                let sites_m = solar.centroids_meters()?;

                let matching = ConstrainedNearestMatcher::new(self.params.join_attempts, self.params.max_distance)
                    .run(&addresses_m, sites_m)?;

                let production = f64_values(solar.data(), "energy_production")?;
                let proximity = ProximityAggregator::new(self.params.proximity_buffer, self.params.top_percentile)?
                    .aggregate(&addresses_m, sites_m, &production)?;

                (matching, Some(metric_crs), proximity)
            }
            None => {
                warn!("[fusion::pipeline] no addresses left to fuse, skipping solar matching");
                (Matching::default(), None, Vec::new())
            }
        };
        report.matched = matching.len();
        report.unmatched = points.len() - matching.len();

        let solar_ids = (0..df.height())
            .map(|row| matching.for_address(row).map(|pair| pair.site as u32))
            .collect::<Vec<_>>();
        let distances = (0..df.height())
            .map(|row| matching.for_address(row).map(|pair| pair.distance))
            .collect::<Vec<_>>();
        df.with_column(Column::new("solar_id".into(), solar_ids))?;
        set_f64(&mut df, "solar_to_address_distance", distances)?;
        df = join_on(&df, solar.data(), "solar_id", "solar_id", JoinKind::Left)?;
        set_f64(&mut df, PROXIMITY_COLUMN, proximity)?;

        // 7. missing values
        let (mut df, impute) = MissingValueCascade::default().run(df)?;
        report.impute = impute;

        // 8. energy split and derived features
        EnergyFeatures::new(&self.params).apply(&mut df)?;

        info!(
            "[fusion::pipeline] fused {} of {} addresses ({} outside sectors, {} without population); {} matched to solar sites",
            df.height(), report.addresses, report.outside_sectors, report.impute.dropped_rows, report.matched,
        );

        Ok(FusionOutput { features: FeatureTable::new(df)?, solar, matching, metric_crs, report })
    }
}
