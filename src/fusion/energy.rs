use ahash::AHashMap;
use anyhow::{ensure, Result};
use log::{info, warn};
use polars::prelude::*;

use crate::{
    common::{f64_values, has_column, set_f64, str_values},
    config::FusionParams,
    landuse::LandUseClass,
};

/// Street-level consumption columns and the suffix of their per-address outputs.
pub const CONSUMPTION_COLUMNS: [(&str, &str); 2] = [
    ("annual_energy_use_electricity_offtake", "electricity_offtake"),
    ("annual_energy_use_natural_gas_offtake", "natural_gas_offtake"),
];

/// Per-address columns produced by [`EnergySplitApportioner::apportion`].
pub const SPLIT_COLUMNS: [&str; 4] = [
    "residential_electricity_offtake_address",
    "residential_natural_gas_offtake_address",
    "other_electricity_offtake_address",
    "other_natural_gas_offtake_address",
];

/// Number of consumers of each kind sharing one street total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerCounts {
    pub residential: usize,
    pub other: usize,
}

impl ConsumerCounts {
    fn add(&mut self, class: LandUseClass) {
        match class {
            LandUseClass::Residential => self.residential += 1,
            LandUseClass::OtherConsumer => self.other += 1,
            LandUseClass::Unclassified => {}
        }
    }
}

/// Consumption attributed to one address of each kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySplit {
    pub residential_per_address: f64,
    pub other_per_address: f64,
}

/// Splits a street's total consumption between residential and other
/// consumers, weighting each non-residential consumer as `ratio` residential ones.
#[derive(Debug, Clone, Copy)]
pub struct EnergySplitApportioner {
    ratio: f64,
}

impl Default for EnergySplitApportioner {
    fn default() -> Self { Self { ratio: 5.0 } }
}

impl EnergySplitApportioner {
    pub fn new(ratio: f64) -> Result<Self> {
        ensure!(ratio.is_finite() && ratio >= 0.0,
            "[fusion::energy] other/residential energy ratio must be a finite value >= 0, got {ratio}");
        Ok(Self { ratio })
    }

    #[inline] pub fn ratio(&self) -> f64 { self.ratio }

    /// Apportion `total` over `counts`. A street with no consumers of either kind gets 0 for both.
    pub fn split(&self, total: f64, counts: ConsumerCounts) -> EnergySplit {
        let ConsumerCounts { residential, other } = counts;
        match (residential, other) {
            (0, 0) => EnergySplit { residential_per_address: 0.0, other_per_address: 0.0 },
            (0, other) => EnergySplit { residential_per_address: 0.0, other_per_address: total / other as f64 },
            (residential, 0) => EnergySplit { residential_per_address: total / residential as f64, other_per_address: 0.0 },
            (residential, other) => {
                let weighted = residential as f64 + other as f64 * self.ratio;
                let residential_total = total * residential as f64 / weighted;
                EnergySplit {
                    residential_per_address: residential_total / residential as f64,
                    other_per_address: (total - residential_total) / other as f64,
                }
            }
        }
    }

    /// Add the four `*_offtake_address` columns to `df`.
    ///
    /// Rows are grouped by `streetname` and classified by `land_use_type`. The
    /// street total is the mean of its consumption column, since every address
    /// carries the joined street value. Rows without a street, or streets
    /// without any consumption value, get nulls. Each row then keeps only the
    /// columns of its own class.
    pub fn apportion(&self, df: &mut DataFrame) -> Result<()> {
        for name in ["streetname", "land_use_type"] {
            ensure!(has_column(df, name), "[fusion::energy] missing column {name:?}");
        }

        let streets = str_values(df, "streetname")?;
        let classes = str_values(df, "land_use_type")?.iter()
            .map(|label| LandUseClass::from_label(label.as_deref()))
            .collect::<Vec<_>>();

        let mut counts: AHashMap<&str, ConsumerCounts> = AHashMap::new();
        for (street, &class) in streets.iter().zip(&classes) {
            if let Some(street) = street {
                counts.entry(street.as_str()).or_default().add(class);
            }
        }

        for (source, suffix) in CONSUMPTION_COLUMNS {
            let consumption = if has_column(df, source) {
                f64_values(df, source)?
            } else {
                warn!("[fusion::energy] no {source:?} column, {suffix} split will be null");
                vec![None; df.height()]
            };

            let mut sums: AHashMap<&str, (f64, usize)> = AHashMap::new();
            for (street, value) in streets.iter().zip(&consumption) {
                if let (Some(street), Some(value)) = (street, value) {
                    let entry = sums.entry(street.as_str()).or_default();
                    entry.0 += value;
                    entry.1 += 1;
                }
            }

            let splits = counts.iter()
                .filter_map(|(&street, &count)| {
                    let &(sum, n) = sums.get(street)?;
                    Some((street, self.split(sum / n as f64, count)))
                })
                .collect::<AHashMap<_, _>>();

            let (residential, other): (Vec<_>, Vec<_>) = streets.iter().zip(&classes)
                .map(|(street, class)| {
                    let split = street.as_deref().and_then(|street| splits.get(street));
                    match class {
                        LandUseClass::Residential => (split.map(|s| s.residential_per_address), None),
                        LandUseClass::OtherConsumer => (None, split.map(|s| s.other_per_address)),
                        LandUseClass::Unclassified => (None, None),
                    }
                })
                .unzip();

            set_f64(df, &format!("residential_{suffix}_address"), residential)?;
            set_f64(df, &format!("other_{suffix}_address"), other)?;
        }

        info!("[fusion::energy] apportioned street consumption over {} streets", counts.len());
        Ok(())
    }
}

/// Adds the cost and energy-mix columns derived from the apportioned consumption.
#[derive(Debug, Clone)]
pub struct EnergyFeatures<'a> {
    params: &'a FusionParams,
}

impl<'a> EnergyFeatures<'a> {
    /// Residential energy cost share of income above this is treated as an outlier.
    pub const MAX_INCOME_SHARE: f64 = 0.8;

    pub fn new(params: &'a FusionParams) -> Self {
        Self { params }
    }

    /// Apportion street consumption, then add every derived column.
    pub fn apply(&self, df: &mut DataFrame) -> Result<()> {
        EnergySplitApportioner::new(self.params.other_residential_energy_ratio)?.apportion(df)?;
        self.energy_cost(df)?;
        self.energy_mix(df)?;
        self.solar_cost(df)?;
        Ok(())
    }

    /// `energy_cost_residential` and `energy_cost_residential_percent_income`.
    pub fn energy_cost(&self, df: &mut DataFrame) -> Result<()> {
        let price = self.params.energy_price;
        let gas = f64_values(df, "residential_natural_gas_offtake_address")?;
        let electricity = f64_values(df, "residential_electricity_offtake_address")?;

        let cost = gas.iter().zip(&electricity)
            .map(|(gas, electricity)| Some(gas.as_ref()? * price.gas + electricity.as_ref()? * price.electricity))
            .collect::<Vec<_>>();

        let income = if has_column(df, "avg_net_tax_income") {
            f64_values(df, "avg_net_tax_income")?
        } else {
            warn!("[fusion::energy] no avg_net_tax_income column, cost share of income will be null");
            vec![None; df.height()]
        };
        let classes = str_values(df, "land_use_type")?;

        let mut outliers = 0;
        let share = cost.iter().zip(&income).zip(&classes)
            .map(|((cost, income), class)| {
                if LandUseClass::from_label(class.as_deref()) != LandUseClass::Residential { return None }
                let share = cost.as_ref()? / income.as_ref()?;
                if share > Self::MAX_INCOME_SHARE {
                    outliers += 1;
                    return None;
                }
                Some(share).filter(|share| share.is_finite())
            })
            .collect::<Vec<_>>();

        if outliers > 0 {
            info!("[fusion::energy] nulled {outliers} energy cost shares above {}", Self::MAX_INCOME_SHARE);
        }

        set_f64(df, "energy_cost_residential", cost)?;
        set_f64(df, "energy_cost_residential_percent_income", share)?;
        Ok(())
    }

    /// `all_energy`, `green_energy` and `fossil_energy`.
    pub fn energy_mix(&self, df: &mut DataFrame) -> Result<()> {
        let mut all = vec![0.0; df.height()];
        for name in SPLIT_COLUMNS {
            for (total, value) in all.iter_mut().zip(f64_values(df, name)?) {
                *total += value.unwrap_or(0.0);
            }
        }

        let ratio = self.params.green_energy_ratio;
        let green = all.iter().map(|all| Some(all * ratio)).collect::<Vec<_>>();
        let fossil = all.iter().map(|all| Some(all - all * ratio)).collect::<Vec<_>>();

        set_f64(df, "all_energy", all.into_iter().map(Some).collect())?;
        set_f64(df, "green_energy", green)?;
        set_f64(df, "fossil_energy", fossil)?;
        Ok(())
    }

    /// `solar_cost`, null where there is no solar opportunity area.
    pub fn solar_cost(&self, df: &mut DataFrame) -> Result<()> {
        if !has_column(df, "solar_opportunity_area") {
            warn!("[fusion::energy] no solar_opportunity_area column, skipping solar_cost");
            return Ok(());
        }
        let cost = f64_values(df, "solar_opportunity_area")?.into_iter()
            .map(|area| area.map(|area| area * self.params.solar_panel_cost_per_m2))
            .collect();
        set_f64(df, "solar_cost", cost)
    }
}
