//! # Cable Calculations
//!
//! Each calculation follows the pattern:
//!
//! - `*Input` - Form parameters (JSON-serializable)
//! - `*Result` - Calculation results (JSON-serializable)
//! - a pure function taking the input and a [`CableTables`] implementation
//!
//! ## Available Calculations
//!
//! - [`sizing`] - Smallest compliant section and parallel-run count
//! - [`voltage_drop`] - Drop of a given cable, plus the section catalogue

pub mod sizing;
pub mod voltage_drop;

use serde::{Deserialize, Serialize};

use crate::errors::CalcResult;
use crate::tables::CableTables;

pub use sizing::{
    calculate, size_cable, CableSelection, CableSizingInput, DesignRequest, LoadSpec, SizingResult, MAX_PARALLEL_RUNS,
};
pub use voltage_drop::{check_voltage_drop, section_catalogue, VoltageDropInput, VoltageDropResult};

/// Enum wrapper for all calculation types.
///
/// Lets the archive store both kinds of calculation in one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationItem {
    /// Full section search
    CableSizing(CableSizingInput),
    /// Voltage drop of a chosen cable
    VoltageDrop(VoltageDropInput),
}

impl CalculationItem {
    /// Get the user-provided label for this calculation
    pub fn label(&self) -> &str {
        match self {
            CalculationItem::CableSizing(c) => &c.label,
            CalculationItem::VoltageDrop(v) => &v.label,
        }
    }

    /// Get the calculation type as a string
    pub fn calc_type(&self) -> &'static str {
        match self {
            CalculationItem::CableSizing(_) => "Cable sizing",
            CalculationItem::VoltageDrop(_) => "Voltage drop",
        }
    }

    /// Run the calculation against a set of tables
    pub fn evaluate<T>(&self, tables: &T) -> CalcResult<CalculationOutcome>
    where
        T: CableTables + ?Sized,
    {
        match self {
            CalculationItem::CableSizing(input) => calculate(input, tables).map(CalculationOutcome::CableSizing),
            CalculationItem::VoltageDrop(input) => {
                check_voltage_drop(input, tables).map(CalculationOutcome::VoltageDrop)
            }
        }
    }
}

/// Result of evaluating a [`CalculationItem`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationOutcome {
    CableSizing(SizingResult),
    VoltageDrop(VoltageDropResult),
}

impl CalculationOutcome {
    /// One-line summary for archive listings
    pub fn summary(&self) -> String {
        match self {
            CalculationOutcome::CableSizing(result) => match &result.selection {
                Some(selection) => format!(
                    "{}, Iz {:.1} A, ΔV {:.2} %",
                    selection.designation(),
                    selection.allowed_current_a,
                    selection.voltage_drop_percent
                ),
                None => "no compliant section".to_string(),
            },
            CalculationOutcome::VoltageDrop(result) => format!("ΔV {:.2} %", result.drop.percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductors::{Material, PhaseSystem};
    use crate::tables::reference_database;

    fn sizing_item() -> CalculationItem {
        CalculationItem::CableSizing(CableSizingInput {
            label: "Kitchen".to_string(),
            load: LoadSpec::Current { amps: 16.0 },
            length_m: 50.0,
            ..CableSizingInput::default()
        })
    }

    #[test]
    fn test_label_and_type() {
        let item = sizing_item();
        assert_eq!(item.label(), "Kitchen");
        assert_eq!(item.calc_type(), "Cable sizing");
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_string(&sizing_item()).unwrap();
        assert!(json.contains("\"type\":\"CableSizing\""));
        let parsed: CalculationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sizing_item());
    }

    #[test]
    fn test_evaluate_dispatches() {
        let db = reference_database().unwrap();
        match sizing_item().evaluate(db).unwrap() {
            CalculationOutcome::CableSizing(result) => assert!(result.found()),
            other => panic!("unexpected outcome {:?}", other),
        }

        let drop = CalculationItem::VoltageDrop(VoltageDropInput {
            label: "Check".to_string(),
            voltage_v: 400.0,
            phase: PhaseSystem::ThreePhase,
            current_a: 32.0,
            length_m: 60.0,
            material: Material::Copper,
            section_mm2: 6.0,
            power_factor: 0.9,
            parallel_runs: 1,
            max_voltage_drop_percent: None,
        });
        assert_eq!(drop.calc_type(), "Voltage drop");
        assert!(matches!(drop.evaluate(db).unwrap(), CalculationOutcome::VoltageDrop(_)));
    }

    #[test]
    fn test_outcome_summary() {
        let db = reference_database().unwrap();
        let summary = sizing_item().evaluate(db).unwrap().summary();
        assert!(summary.starts_with("4 mm², Iz "), "{}", summary);

        let none = CalculationOutcome::CableSizing(SizingResult {
            design_current_a: 16.0,
            selection: None,
            candidates_evaluated: 0,
        });
        assert_eq!(none.summary(), "no compliant section");
    }
}
