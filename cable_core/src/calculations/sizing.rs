//! # Cable Sizing
//!
//! Finds the smallest conductor configuration that carries the design
//! current after derating and keeps the voltage drop within the limit.
//!
//! ## Search order
//!
//! ```text
//! for N in base_parallel_runs ..= (auto ? 6 : base_parallel_runs):
//!     K = k1·k2·k3·k4 for N
//!     for S in sections ascending:
//!         skip aluminium below 10 mm², skip table gaps
//!         Iz = I0(S) · K · N            → next S if Iz < Ib
//!         ΔV% with R/N, X/N             → accept if ΔV% ≤ limit
//! ```
//!
//! The outer loop is over run count and the inner over section, so the
//! answer is the smallest section at the smallest viable run count. That
//! is not always the least copper overall.
//!
//! "No compliant cable" is a normal result (`selection: None`), not an error.
//!
//! ## Example
//!
//! ```rust
//! use cable_core::calculations::sizing::{calculate, CableSizingInput, LoadSpec};
//! use cable_core::tables::reference_database;
//!
//! let input = CableSizingInput {
//!     label: "Kitchen ring".to_string(),
//!     load: LoadSpec::Current { amps: 16.0 },
//!     length_m: 50.0,
//!     ..CableSizingInput::default()
//! };
//!
//! let db = reference_database().unwrap();
//! let result = calculate(&input, db).unwrap();
//! assert!(result.found());
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::conductors::{
    format_section, Environment, InstallationMethod, InsulationClass, Material, PhaseSystem, TensionCategory,
};
use crate::derating::{DeratingConditions, DeratingFactors, DeratingSource, FactorResolver};
use crate::equations::{allowed_current, design_current, voltage_drop};
use crate::errors::{CalcError, CalcResult};
use crate::tables::{AmpacityScope, CableTables};

/// Upper bound on conductors per phase when auto-parallel is on
pub const MAX_PARALLEL_RUNS: u32 = 6;

/// How the load is specified on the form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadSpec {
    /// Design current given directly
    Current { amps: f64 },
    /// Active power; the design current is derived from it
    Power { kw: f64 },
}

impl Default for LoadSpec {
    fn default() -> Self {
        LoadSpec::Current { amps: 0.0 }
    }
}

/// User-facing sizing parameters.
///
/// ## JSON Example
///
/// ```json
/// {
///   "label": "Pump P-101",
///   "voltage_v": 400.0,
///   "phase": "three_phase",
///   "load": { "kind": "power", "kw": 22.0 },
///   "length_m": 120.0,
///   "power_factor": 0.85,
///   "max_voltage_drop_percent": 4.0,
///   "material": "copper",
///   "insulation": "EPR",
///   "tension": "LV",
///   "installation_method": "D1",
///   "derating": {
///     "type": "Conditions",
///     "value": { "ambient_temperature_c": 25.0, "grouping_count": 2 }
///   },
///   "base_parallel_runs": 1,
///   "allow_auto_parallel": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableSizingInput {
    /// User label for this circuit (e.g., "Pump P-101")
    #[serde(default)]
    pub label: String,

    /// Nominal voltage (V); phase-to-phase for three-phase
    pub voltage_v: f64,

    /// Single-phase or three-phase supply
    pub phase: PhaseSystem,

    /// Load as current or power
    pub load: LoadSpec,

    /// One-way run length (m)
    pub length_m: f64,

    /// Load power factor cosφ, lagging
    pub power_factor: f64,

    /// Maximum permitted voltage drop (% of nominal)
    pub max_voltage_drop_percent: f64,

    pub material: Material,

    pub insulation: InsulationClass,

    #[serde(default)]
    pub tension: TensionCategory,

    pub installation_method: InstallationMethod,

    #[serde(default)]
    pub derating: DeratingSource,

    /// Conductors per phase to start the search from
    #[serde(default = "default_parallel_runs")]
    pub base_parallel_runs: u32,

    /// Let the search add parallel runs up to [`MAX_PARALLEL_RUNS`]
    #[serde(default)]
    pub allow_auto_parallel: bool,
}

fn default_parallel_runs() -> u32 {
    1
}

impl Default for CableSizingInput {
    fn default() -> Self {
        CableSizingInput {
            label: String::new(),
            voltage_v: 230.0,
            phase: PhaseSystem::SinglePhase,
            load: LoadSpec::default(),
            length_m: 0.0,
            power_factor: 0.9,
            max_voltage_drop_percent: 4.0,
            material: Material::Copper,
            insulation: InsulationClass::Pvc,
            tension: TensionCategory::LowVoltage,
            installation_method: InstallationMethod::C,
            derating: DeratingSource::Conditions(DeratingConditions::default()),
            base_parallel_runs: 1,
            allow_auto_parallel: false,
        }
    }
}

impl CableSizingInput {
    /// Design current Ib (A), given or derived from power
    pub fn design_current_a(&self) -> f64 {
        match self.load {
            LoadSpec::Current { amps } => amps,
            LoadSpec::Power { kw } => design_current(kw, self.voltage_v, self.power_factor, self.phase),
        }
    }

    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        match self.load {
            LoadSpec::Current { amps } if !(amps.is_finite() && amps > 0.0) => {
                return Err(CalcError::invalid_input(
                    "load.amps",
                    amps.to_string(),
                    "Design current must be positive",
                ));
            }
            LoadSpec::Power { kw } if !(kw.is_finite() && kw > 0.0) => {
                return Err(CalcError::invalid_input(
                    "load.kw",
                    kw.to_string(),
                    "Power must be positive",
                ));
            }
            _ => {}
        }
        if let DeratingSource::Conditions(conditions) = &self.derating {
            if let Some(t) = conditions.ambient_temperature_c {
                if !t.is_finite() {
                    return Err(CalcError::invalid_input(
                        "derating.ambient_temperature_c",
                        t.to_string(),
                        "Temperature must be a number",
                    ));
                }
            }
        }
        if let DeratingSource::Fixed(factors) = &self.derating {
            if factors.as_array().iter().any(|k| !(k.is_finite() && *k > 0.0)) {
                return Err(CalcError::invalid_input(
                    "derating",
                    format!("{:?}", factors.as_array()),
                    "Derating factors must be positive",
                ));
            }
        }
        self.design_request_unchecked().validate()
    }

    /// Build the immutable request the search runs on
    pub fn design_request(&self) -> CalcResult<DesignRequest> {
        self.validate()?;
        Ok(self.design_request_unchecked())
    }

    fn design_request_unchecked(&self) -> DesignRequest {
        DesignRequest {
            voltage_v: self.voltage_v,
            phase: self.phase,
            design_current_a: self.design_current_a(),
            length_m: self.length_m,
            power_factor: self.power_factor,
            max_voltage_drop_percent: self.max_voltage_drop_percent,
            material: self.material,
            insulation: self.insulation,
            tension: self.tension,
            installation_method: self.installation_method,
            base_parallel_runs: self.base_parallel_runs,
            allow_auto_parallel: self.allow_auto_parallel,
        }
    }
}

/// Everything the search needs, with the design current already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub voltage_v: f64,
    pub phase: PhaseSystem,
    pub design_current_a: f64,
    pub length_m: f64,
    pub power_factor: f64,
    pub max_voltage_drop_percent: f64,
    pub material: Material,
    pub insulation: InsulationClass,
    pub tension: TensionCategory,
    pub installation_method: InstallationMethod,
    pub base_parallel_runs: u32,
    pub allow_auto_parallel: bool,
}

impl DesignRequest {
    /// Reject anything that would make the search meaningless
    pub fn validate(&self) -> CalcResult<()> {
        positive("voltage_v", self.voltage_v, "Voltage must be positive")?;
        positive("design_current_a", self.design_current_a, "Design current must be positive")?;
        positive("length_m", self.length_m, "Length must be positive")?;
        positive(
            "max_voltage_drop_percent",
            self.max_voltage_drop_percent,
            "Maximum voltage drop must be positive",
        )?;
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(CalcError::invalid_input(
                "power_factor",
                self.power_factor.to_string(),
                "Power factor must be in (0, 1]",
            ));
        }
        if self.base_parallel_runs == 0 {
            return Err(CalcError::invalid_input(
                "base_parallel_runs",
                "0",
                "At least one conductor per phase is required",
            ));
        }
        Ok(())
    }

    /// Ampacity table this request reads from
    pub fn ampacity_scope(&self) -> AmpacityScope {
        AmpacityScope {
            tension: self.tension,
            insulation: self.insulation,
            material: self.material,
            method: self.installation_method,
            arrangement: self.phase.arrangement(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.installation_method.environment()
    }

    /// Last run count the search will try
    pub fn max_parallel_runs(&self) -> u32 {
        if self.allow_auto_parallel {
            MAX_PARALLEL_RUNS.max(self.base_parallel_runs)
        } else {
            self.base_parallel_runs
        }
    }
}

fn positive(field: &str, value: f64, reason: &str) -> CalcResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CalcError::invalid_input(field, value.to_string(), reason))
    }
}

/// The accepted configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CableSelection {
    /// Cross-section per conductor (mm²)
    pub section_mm2: f64,
    /// Conductors per phase
    pub parallel_runs: u32,
    /// Tabulated ampacity of one conductor at reference conditions (A)
    pub base_ampacity_a: f64,
    /// Permissible current Iz of the whole configuration (A)
    pub allowed_current_a: f64,
    /// Factors applied at this run count
    pub factors: DeratingFactors,
    /// Tabulated per-conductor resistance (Ω/km)
    pub resistance_ohm_km: f64,
    /// Tabulated per-conductor reactance (Ω/km)
    pub reactance_ohm_km: f64,
    /// Voltage drop (V)
    pub voltage_drop_v: f64,
    /// Voltage drop (% of nominal)
    pub voltage_drop_percent: f64,
}

impl CableSelection {
    /// "4 mm²" or "2 × 120 mm²"
    pub fn designation(&self) -> String {
        if self.parallel_runs > 1 {
            format!("{} × {} mm²", self.parallel_runs, format_section(self.section_mm2))
        } else {
            format!("{} mm²", format_section(self.section_mm2))
        }
    }
}

/// Outcome of one sizing calculation.
///
/// ## JSON Example
///
/// ```json
/// {
///   "design_current_a": 16.0,
///   "selection": {
///     "section_mm2": 4.0,
///     "parallel_runs": 1,
///     "base_ampacity_a": 26.0,
///     "allowed_current_a": 26.0,
///     "factors": { "k1_temperature": 1.0, "k2_grouping": 1.0, "k3_burial_depth": 1.0, "k4_soil_resistivity": 1.0 },
///     "resistance_ohm_km": 5.57,
///     "reactance_ohm_km": 0.101,
///     "voltage_drop_v": 8.09,
///     "voltage_drop_percent": 3.52
///   },
///   "candidates_evaluated": 3
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    /// Design current Ib (A)
    pub design_current_a: f64,
    /// First configuration meeting both constraints, if any
    pub selection: Option<CableSelection>,
    /// Candidates that reached the thermal check
    pub candidates_evaluated: u32,
}

impl SizingResult {
    /// Whether a compliant configuration exists
    pub fn found(&self) -> bool {
        self.selection.is_some()
    }

    pub fn section_mm2(&self) -> Option<f64> {
        self.selection.map(|s| s.section_mm2)
    }

    pub fn parallel_runs(&self) -> Option<u32> {
        self.selection.map(|s| s.parallel_runs)
    }

    pub fn allowed_current_a(&self) -> Option<f64> {
        self.selection.map(|s| s.allowed_current_a)
    }

    pub fn voltage_drop_percent(&self) -> Option<f64> {
        self.selection.map(|s| s.voltage_drop_percent)
    }
}

/// Search the tables for the first configuration meeting both the thermal
/// and the voltage-drop constraint.
///
/// # Arguments
///
/// * `request` - Validated design parameters
/// * `tables` - Ampacity and impedance lookups
/// * `resolver` - Derating factors per run count
///
/// # Returns
///
/// * `Ok(SizingResult)` - With `selection: None` when nothing complies
/// * `Err(CalcError::InvalidInput)` - Request fails validation
/// * `Err(CalcError::TableNotFound)` - The ampacity scope does not exist at all
pub fn size_cable<T, R>(request: &DesignRequest, tables: &T, resolver: &R) -> CalcResult<SizingResult>
where
    T: CableTables + ?Sized,
    R: FactorResolver + ?Sized,
{
    request.validate()?;

    let scope = request.ampacity_scope();
    if !tables.has_ampacity_scope(&scope) {
        return Err(CalcError::table_not_found(scope.to_string()));
    }

    let ib = request.design_current_a;
    let arrangement = request.phase.arrangement();
    let min_section = request.material.min_section_mm2();
    let sections = tables.cross_sections(&scope);
    let mut candidates_evaluated = 0;

    for runs in request.base_parallel_runs..=request.max_parallel_runs() {
        let factors = resolver.factors(runs);
        let k_total = factors.total();
        debug!(runs, k_total, "trying parallel run count");

        for &section in &sections {
            if min_section.is_some_and(|min| section < min) {
                continue;
            }

            let i0 = match tables.ampacity(&scope, section) {
                Ok(i0) => i0,
                Err(missing) => {
                    trace!(%missing, "skipping section");
                    continue;
                }
            };

            candidates_evaluated += 1;
            let iz = allowed_current(i0, k_total, runs);
            if iz < ib {
                trace!(section, runs, iz, ib, "thermal check failed");
                continue;
            }

            let impedance = match tables.impedance(request.material, arrangement, section) {
                Ok(z) => z,
                Err(missing) => {
                    trace!(%missing, "skipping section");
                    continue;
                }
            };
            let per_phase = impedance.parallel(runs);
            let dv = voltage_drop(
                request.voltage_v,
                ib,
                request.length_m,
                per_phase.r_ohm_km,
                per_phase.x_ohm_km,
                request.power_factor,
                request.phase,
            );

            if dv.percent <= request.max_voltage_drop_percent {
                debug!(section, runs, iz, dv_percent = dv.percent, "configuration accepted");
                return Ok(SizingResult {
                    design_current_a: ib,
                    selection: Some(CableSelection {
                        section_mm2: section,
                        parallel_runs: runs,
                        base_ampacity_a: i0,
                        allowed_current_a: iz,
                        factors,
                        resistance_ohm_km: impedance.r_ohm_km,
                        reactance_ohm_km: impedance.x_ohm_km,
                        voltage_drop_v: dv.volts,
                        voltage_drop_percent: dv.percent,
                    }),
                    candidates_evaluated,
                });
            }
            trace!(section, runs, dv_percent = dv.percent, "voltage drop check failed");
        }
    }

    debug!(ib, "no compliant configuration");
    Ok(SizingResult {
        design_current_a: ib,
        selection: None,
        candidates_evaluated,
    })
}

/// Validate the form, resolve derating from the database and size the cable.
///
/// # Example
///
/// ```rust
/// use cable_core::calculations::sizing::{calculate, CableSizingInput, LoadSpec};
/// use cable_core::conductors::PhaseSystem;
/// use cable_core::tables::reference_database;
///
/// let input = CableSizingInput {
///     voltage_v: 400.0,
///     phase: PhaseSystem::ThreePhase,
///     load: LoadSpec::Power { kw: 15.0 },
///     length_m: 40.0,
///     ..CableSizingInput::default()
/// };
/// let result = calculate(&input, reference_database().unwrap()).unwrap();
/// println!("{:?}", result.selection.map(|s| s.designation()));
/// ```
pub fn calculate<T>(input: &CableSizingInput, tables: &T) -> CalcResult<SizingResult>
where
    T: CableTables + ?Sized,
{
    let request = input.design_request()?;
    let resolver = input.derating.resolver(
        tables.correction_tables(),
        request.tension,
        request.environment(),
        request.insulation,
    );
    size_cable(&request, tables, &resolver)
}
