//! # Voltage Drop Check
//!
//! Quick check of a known cable: given the section, how much does the
//! voltage drop over the run? No thermal check and no search.
//!
//! Uses the same multicore impedance table as the sizing search so the two
//! always agree on the drop of a given section.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conductors::{format_section, CableConstruction, Material, PhaseSystem};
use crate::equations::{voltage_drop, VoltageDrop};
use crate::errors::{CalcError, CalcResult};
use crate::tables::{CableTables, Impedance};

/// Parameters for a voltage-drop check.
///
/// ## JSON Example
///
/// ```json
/// {
///   "label": "Lighting L3",
///   "voltage_v": 230.0,
///   "phase": "single_phase",
///   "current_a": 10.0,
///   "length_m": 35.0,
///   "material": "copper",
///   "section_mm2": 1.5,
///   "max_voltage_drop_percent": 4.0
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageDropInput {
    #[serde(default)]
    pub label: String,

    /// Nominal voltage (V)
    pub voltage_v: f64,

    pub phase: PhaseSystem,

    /// Load current (A)
    pub current_a: f64,

    /// One-way run length (m)
    pub length_m: f64,

    pub material: Material,

    /// Cross-section per conductor (mm²)
    pub section_mm2: f64,

    /// Load power factor cosφ
    #[serde(default = "default_power_factor")]
    pub power_factor: f64,

    /// Conductors per phase
    #[serde(default = "default_parallel_runs")]
    pub parallel_runs: u32,

    /// Limit to compare against, if any
    #[serde(default)]
    pub max_voltage_drop_percent: Option<f64>,
}

fn default_power_factor() -> f64 {
    0.9
}

fn default_parallel_runs() -> u32 {
    1
}

impl VoltageDropInput {
    pub fn validate(&self) -> CalcResult<()> {
        let positive = [
            ("voltage_v", self.voltage_v),
            ("current_a", self.current_a),
            ("length_m", self.length_m),
            ("section_mm2", self.section_mm2),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CalcError::invalid_input(field, value.to_string(), "Must be positive"));
            }
        }
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(CalcError::invalid_input(
                "power_factor",
                self.power_factor.to_string(),
                "Power factor must be in (0, 1]",
            ));
        }
        if self.parallel_runs == 0 {
            return Err(CalcError::invalid_input(
                "parallel_runs",
                "0",
                "At least one conductor per phase is required",
            ));
        }
        if let Some(limit) = self.max_voltage_drop_percent {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(CalcError::invalid_input(
                    "max_voltage_drop_percent",
                    limit.to_string(),
                    "Maximum voltage drop must be positive",
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of a voltage-drop check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageDropResult {
    pub drop: VoltageDrop,
    /// Tabulated per-conductor impedance
    pub impedance: Impedance,
    /// Limit the drop was compared against
    pub max_voltage_drop_percent: Option<f64>,
}

impl VoltageDropResult {
    /// `None` when no limit was given
    pub fn passes(&self) -> Option<bool> {
        self.max_voltage_drop_percent
            .map(|limit| self.drop.percent <= limit)
    }
}

/// Compute the voltage drop of a given cable.
///
/// # Returns
///
/// * `Err(CalcError::TableNotFound)` - No impedance for this material and section
pub fn check_voltage_drop<T>(input: &VoltageDropInput, tables: &T) -> CalcResult<VoltageDropResult>
where
    T: CableTables + ?Sized,
{
    input.validate()?;

    let impedance = tables.impedance(input.material, input.phase.arrangement(), input.section_mm2)?;
    let per_phase = impedance.parallel(input.parallel_runs);
    let drop = voltage_drop(
        input.voltage_v,
        input.current_a,
        input.length_m,
        per_phase.r_ohm_km,
        per_phase.x_ohm_km,
        input.power_factor,
        input.phase,
    );
    debug!(
        section = %format_section(input.section_mm2),
        runs = input.parallel_runs,
        percent = drop.percent,
        "voltage drop checked"
    );

    Ok(VoltageDropResult {
        drop,
        impedance,
        max_voltage_drop_percent: input.max_voltage_drop_percent,
    })
}

/// Sections a material can be selected at, ascending.
///
/// Read from the multicore impedance table with the aluminium floor applied,
/// which is the list offered for the quick check.
pub fn section_catalogue<T>(tables: &T, material: Material) -> Vec<f64>
where
    T: CableTables + ?Sized,
{
    let min = material.min_section_mm2();
    tables
        .impedance_table(material, CableConstruction::Multicore)
        .map(|t| t.sections())
        .unwrap_or_default()
        .into_iter()
        .filter(|s| min.map_or(true, |m| *s >= m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::reference_database;

    fn input() -> VoltageDropInput {
        VoltageDropInput {
            label: "Lighting".to_string(),
            voltage_v: 230.0,
            phase: PhaseSystem::SinglePhase,
            current_a: 16.0,
            length_m: 50.0,
            material: Material::Copper,
            section_mm2: 4.0,
            power_factor: 0.9,
            parallel_runs: 1,
            max_voltage_drop_percent: Some(4.0),
        }
    }

    #[test]
    fn test_drop_of_known_cable() {
        let result = check_voltage_drop(&input(), reference_database().unwrap()).unwrap();
        assert!((result.drop.percent - 3.518).abs() < 1e-3);
        assert_eq!(result.impedance.r_ohm_km, 5.57);
        assert_eq!(result.passes(), Some(true));
    }

    #[test]
    fn test_limit_exceeded() {
        let check = VoltageDropInput {
            section_mm2: 2.5,
            ..input()
        };
        let result = check_voltage_drop(&check, reference_database().unwrap()).unwrap();
        assert_eq!(result.passes(), Some(false));
    }

    #[test]
    fn test_no_limit() {
        let check = VoltageDropInput {
            max_voltage_drop_percent: None,
            ..input()
        };
        let result = check_voltage_drop(&check, reference_database().unwrap()).unwrap();
        assert_eq!(result.passes(), None);
    }

    #[test]
    fn test_parallel_runs_halve_drop() {
        let db = reference_database().unwrap();
        let one = check_voltage_drop(&input(), db).unwrap();
        let two = check_voltage_drop(
            &VoltageDropInput {
                parallel_runs: 2,
                ..input()
            },
            db,
        )
        .unwrap();
        assert!((two.drop.volts - one.drop.volts / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_section_is_table_error() {
        let check = VoltageDropInput {
            section_mm2: 3.0,
            ..input()
        };
        let err = check_voltage_drop(&check, reference_database().unwrap()).unwrap_err();
        assert_eq!(err.error_code(), "TABLE_NOT_FOUND");
    }

    #[test]
    fn test_invalid_power_factor() {
        let check = VoltageDropInput {
            power_factor: 1.5,
            ..input()
        };
        let err = check_voltage_drop(&check, reference_database().unwrap()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_section_catalogue() {
        let db = reference_database().unwrap();
        let copper = section_catalogue(db, Material::Copper);
        assert_eq!(copper.first(), Some(&1.5));
        assert!(copper.windows(2).all(|w| w[0] < w[1]));

        let aluminum = section_catalogue(db, Material::Aluminum);
        assert_eq!(aluminum.first(), Some(&10.0));
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{
            "voltage_v": 400.0,
            "phase": "three_phase",
            "current_a": 32.0,
            "length_m": 80.0,
            "material": "aluminum",
            "section_mm2": 16.0
        }"#;
        let parsed: VoltageDropInput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.power_factor, 0.9);
        assert_eq!(parsed.parallel_runs, 1);
        assert_eq!(parsed.max_voltage_drop_percent, None);
    }
}
