//! # Derating Factor Resolver
//!
//! Environmental correction factors applied to tabulated ampacity:
//!
//! ```text
//! Iz = I0 × k1 × k2 × k3 × k4 × N
//! ```
//!
//! ## Factor Summary
//!
//! | Factor | Description              | Applies to    |
//! |--------|--------------------------|---------------|
//! | k1     | Ambient temperature      | air, buried   |
//! | k2     | Grouping of circuits     | air, buried   |
//! | k3     | Laying depth             | buried only   |
//! | k4     | Soil thermal resistivity | buried only   |
//!
//! ## Grouping and parallel runs
//!
//! Each parallel run is a circuit of its own for grouping purposes, so the
//! effective group is `grouping_count × N`, capped at 6 in air and 5 in
//! ground. When the table has no entry for the effective group the factor
//! of the largest tabulated group is used: the worst documented derating is
//! the floor, the table is never extrapolated.
//!
//! ## Medium voltage
//!
//! The database carries no correction tables for medium voltage, so every
//! factor is 1.0 there. This is a data gap, not an electrical exemption.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conductors::{Environment, InsulationClass, TensionCategory};
use crate::tables::{CorrectionTables, LevelTable};

/// Combined correction factors for one candidate run count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeratingFactors {
    /// Ambient temperature factor
    pub k1_temperature: f64,
    /// Grouping factor
    pub k2_grouping: f64,
    /// Laying depth factor
    pub k3_burial_depth: f64,
    /// Soil thermal resistivity factor
    pub k4_soil_resistivity: f64,
}

impl Default for DeratingFactors {
    fn default() -> Self {
        Self::unity()
    }
}

impl DeratingFactors {
    /// All factors 1.0 (reference conditions)
    pub fn unity() -> Self {
        DeratingFactors {
            k1_temperature: 1.0,
            k2_grouping: 1.0,
            k3_burial_depth: 1.0,
            k4_soil_resistivity: 1.0,
        }
    }

    pub fn new(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        DeratingFactors {
            k1_temperature: k1,
            k2_grouping: k2,
            k3_burial_depth: k3,
            k4_soil_resistivity: k4,
        }
    }

    /// Ktot = k1 · k2 · k3 · k4
    pub fn total(&self) -> f64 {
        self.k1_temperature * self.k2_grouping * self.k3_burial_depth * self.k4_soil_resistivity
    }

    /// All four factors in order
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.k1_temperature,
            self.k2_grouping,
            self.k3_burial_depth,
            self.k4_soil_resistivity,
        ]
    }
}

/// Site conditions the factors are looked up from.
///
/// `None` means reference conditions (factor 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeratingConditions {
    /// Ambient air or ground temperature (°C)
    #[serde(default)]
    pub ambient_temperature_c: Option<f64>,
    /// Circuits laid together, counting this one
    #[serde(default = "default_grouping")]
    pub grouping_count: u32,
    /// Laying depth (m), buried installations only
    #[serde(default)]
    pub burial_depth_m: Option<f64>,
    /// Soil thermal resistivity (K·m/W), buried installations only
    #[serde(default)]
    pub soil_resistivity_km_w: Option<f64>,
}

fn default_grouping() -> u32 {
    1
}

impl Default for DeratingConditions {
    fn default() -> Self {
        DeratingConditions {
            ambient_temperature_c: None,
            grouping_count: 1,
            burial_depth_m: None,
            soil_resistivity_km_w: None,
        }
    }
}

/// Where the k-factors of a calculation come from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DeratingSource {
    /// Looked up from the correction tables for every run count
    Conditions(DeratingConditions),
    /// Picked by the user; used as-is for every run count
    Fixed(DeratingFactors),
}

impl Default for DeratingSource {
    fn default() -> Self {
        DeratingSource::Conditions(DeratingConditions::default())
    }
}

impl DeratingSource {
    /// Build the resolver the sizing search calls once per run count
    pub fn resolver<'a>(
        &self,
        tables: &'a CorrectionTables,
        tension: TensionCategory,
        environment: Environment,
        insulation: InsulationClass,
    ) -> ConfiguredResolver<'a> {
        if !tension.has_correction_tables() {
            return ConfiguredResolver::Fixed(DeratingFactors::unity());
        }
        match self {
            DeratingSource::Conditions(conditions) => ConfiguredResolver::Tables(TableFactorResolver {
                tables,
                tension,
                environment,
                insulation,
                conditions: *conditions,
            }),
            DeratingSource::Fixed(factors) => ConfiguredResolver::Fixed(*factors),
        }
    }
}

/// Supplies the derating factors for a given parallel-run count
pub trait FactorResolver {
    fn factors(&self, parallel_runs: u32) -> DeratingFactors;
}

impl FactorResolver for DeratingFactors {
    fn factors(&self, _parallel_runs: u32) -> DeratingFactors {
        *self
    }
}

impl<F> FactorResolver for F
where
    F: Fn(u32) -> DeratingFactors,
{
    fn factors(&self, parallel_runs: u32) -> DeratingFactors {
        self(parallel_runs)
    }
}

/// Table-driven resolver bound to one installation
#[derive(Debug, Clone, Copy)]
pub struct TableFactorResolver<'a> {
    pub tables: &'a CorrectionTables,
    pub tension: TensionCategory,
    pub environment: Environment,
    pub insulation: InsulationClass,
    pub conditions: DeratingConditions,
}

impl FactorResolver for TableFactorResolver<'_> {
    fn factors(&self, parallel_runs: u32) -> DeratingFactors {
        resolve_factors(
            self.tables,
            self.tension,
            self.environment,
            self.insulation,
            &self.conditions,
            parallel_runs,
        )
    }
}

/// Resolver chosen from a [`DeratingSource`]
#[derive(Debug, Clone, Copy)]
pub enum ConfiguredResolver<'a> {
    Tables(TableFactorResolver<'a>),
    Fixed(DeratingFactors),
}

impl FactorResolver for ConfiguredResolver<'_> {
    fn factors(&self, parallel_runs: u32) -> DeratingFactors {
        match self {
            ConfiguredResolver::Tables(resolver) => resolver.factors(parallel_runs),
            ConfiguredResolver::Fixed(factors) => *factors,
        }
    }
}

/// Effective group size for the grouping table
pub fn effective_group_size(grouping_count: u32, parallel_runs: u32, environment: Environment) -> u32 {
    grouping_count
        .max(1)
        .saturating_mul(parallel_runs.max(1))
        .min(environment.grouping_cap())
}

/// Look up and compose k1..k4 for one installation and run count.
pub fn resolve_factors(
    tables: &CorrectionTables,
    tension: TensionCategory,
    environment: Environment,
    insulation: InsulationClass,
    conditions: &DeratingConditions,
    parallel_runs: u32,
) -> DeratingFactors {
    if !tension.has_correction_tables() {
        return DeratingFactors::unity();
    }

    let env_tables = tables.for_environment(environment);

    let k1 = match conditions.ambient_temperature_c {
        Some(temperature) => match env_tables.temperature.get(insulation.code()) {
            Some(table) => table.factor(temperature).unwrap_or_else(|| {
                debug!(temperature, insulation = insulation.code(), "temperature not tabulated, using 1.0");
                1.0
            }),
            None => {
                warn!(insulation = insulation.code(), ?environment, "no temperature table, using 1.0");
                1.0
            }
        },
        None => 1.0,
    };

    let group = effective_group_size(conditions.grouping_count, parallel_runs, environment);
    let k2 = grouping_factor(&env_tables.grouping, group);

    let (k3, k4) = match environment {
        Environment::Buried => (
            optional_level("depth", &env_tables.depth, conditions.burial_depth_m),
            optional_level("soil_resistivity", &env_tables.soil_resistivity, conditions.soil_resistivity_km_w),
        ),
        Environment::Air => (1.0, 1.0),
    };

    DeratingFactors::new(k1, k2, k3, k4)
}

/// Exact entry, else the largest tabulated group
fn grouping_factor(table: &LevelTable, group: u32) -> f64 {
    if let Some(k) = table.factor(f64::from(group)) {
        return k;
    }
    match table.largest() {
        Some((largest, k)) => {
            warn!(group, largest, factor = *k, "grouping not tabulated, using largest group");
            *k
        }
        None => {
            warn!(group, "grouping table is empty, using 1.0");
            1.0
        }
    }
}

fn optional_level(name: &str, table: &LevelTable, level: Option<f64>) -> f64 {
    let Some(level) = level else {
        return 1.0;
    };
    if table.is_empty() {
        warn!(table = name, level, "no correction table, using 1.0");
        return 1.0;
    }
    table.factor(level).unwrap_or(1.0)
}
