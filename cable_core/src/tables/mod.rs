//! # Ampacity & Impedance Lookup
//!
//! Read-only access to the per-section tables the sizing engine consults.
//!
//! ## Structure
//!
//! ```text
//! CableDatabase
//! ├── ampacity:   tension → insulation → material → method → { two_wire, three_wire }
//! │                 each a SectionTable<f64>  (section mm² → base ampacity A)
//! ├── impedance:  material → { multicore, single_core }
//! │                 each a SectionTable<Impedance>  (section mm² → R, X in Ω/km)
//! └── correction: { air, buried } → temperature / grouping / depth / soil_resistivity
//! ```
//!
//! Keys are stored as strings ("2.5", "120") because that is how the source
//! tables are published. Iteration order is never taken from the stored
//! order: [`KeyedTable::sections`] parses and sorts by numeric value.
//!
//! A missing entry is reported as [`NotFound`], never as zero, so the search
//! can skip the candidate explicitly.

pub mod database;
pub mod reference;

pub use database::{CableDatabase, CorrectionTables, EnvironmentCorrections};
pub use reference::reference_database;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conductors::{
    format_section, CableConstruction, ConductorArrangement, InstallationMethod, InsulationClass, Material,
    TensionCategory,
};
use crate::errors::{CalcError, CalcResult, LookupResult, NotFound};

/// Tolerance when matching a numeric key against a parsed table key
const KEY_EPSILON: f64 = 1e-9;

/// A table keyed by a numeric level written as a string.
///
/// Used for cross-sections (mm²) and for correction-factor levels
/// (°C, circuit count, m, K·m/W).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyedTable<T>(pub BTreeMap<String, T>);

/// Section (mm²) → value
pub type SectionTable<T> = KeyedTable<T>;

/// Correction level → factor
pub type LevelTable = KeyedTable<f64>;

impl<T> Default for KeyedTable<T> {
    fn default() -> Self {
        KeyedTable(BTreeMap::new())
    }
}

impl<T> KeyedTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under a numeric key
    pub fn insert(&mut self, key: f64, value: T) {
        self.0.insert(format_section(key), value);
    }

    /// Builder-style insert
    pub fn with(mut self, key: f64, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Look up the entry whose numeric key equals `key`
    pub fn get(&self, key: f64) -> Option<&T> {
        self.0
            .iter()
            .find(|(k, _)| parse_key(k).is_some_and(|v| (v - key).abs() < KEY_EPSILON))
            .map(|(_, v)| v)
    }

    /// Numeric keys sorted ascending
    pub fn sections(&self) -> Vec<f64> {
        let mut keys: Vec<f64> = self.0.keys().filter_map(|k| parse_key(k)).collect();
        keys.sort_by(f64::total_cmp);
        keys
    }

    /// Entries sorted ascending by numeric key
    pub fn entries(&self) -> Vec<(f64, &T)> {
        let mut entries: Vec<(f64, &T)> = self
            .0
            .iter()
            .filter_map(|(k, v)| parse_key(k).map(|key| (key, v)))
            .collect();
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        entries
    }

    /// Entry with the largest numeric key
    pub fn largest(&self) -> Option<(f64, &T)> {
        self.entries().into_iter().last()
    }

    /// Check that every key parses to a positive finite number
    pub fn validate_keys(&self, table: &str) -> CalcResult<()> {
        for key in self.0.keys() {
            match parse_key(key) {
                Some(v) if v > 0.0 => {}
                _ => {
                    return Err(CalcError::invalid_table(
                        table,
                        format!("key '{}' is not a positive number", key),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl LevelTable {
    /// Factor tabulated for exactly this level
    pub fn factor(&self, level: f64) -> Option<f64> {
        self.get(level).copied()
    }

    /// Check keys and that every factor is positive
    pub fn validate(&self, table: &str) -> CalcResult<()> {
        self.validate_keys(table)?;
        validate_values(table, self.0.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

fn parse_key(key: &str) -> Option<f64> {
    key.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn validate_values<'a>(table: &str, values: impl Iterator<Item = (&'a str, f64)>) -> CalcResult<()> {
    for (key, value) in values {
        if !value.is_finite() || value <= 0.0 {
            return Err(CalcError::invalid_table(
                table,
                format!("value {} at key '{}' must be positive", value, key),
            ));
        }
    }
    Ok(())
}

/// Per-conductor resistance and reactance per unit length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Impedance {
    /// Resistance (Ω/km)
    #[serde(rename = "r")]
    pub r_ohm_km: f64,
    /// Reactance (Ω/km)
    #[serde(rename = "x")]
    pub x_ohm_km: f64,
}

impl Impedance {
    pub fn new(r_ohm_km: f64, x_ohm_km: f64) -> Self {
        Impedance { r_ohm_km, x_ohm_km }
    }

    /// Equivalent impedance of `runs` identical conductors in parallel
    pub fn parallel(&self, runs: u32) -> Self {
        let n = f64::from(runs.max(1));
        Impedance {
            r_ohm_km: self.r_ohm_km / n,
            x_ohm_km: self.x_ohm_km / n,
        }
    }
}

/// Key selecting one ampacity table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmpacityScope {
    pub tension: TensionCategory,
    pub insulation: InsulationClass,
    pub material: Material,
    pub method: InstallationMethod,
    pub arrangement: ConductorArrangement,
}

impl std::fmt::Display for AmpacityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ampacity {}/{}/{}/{}/{}",
            self.tension.code(),
            self.insulation.code(),
            self.material.code(),
            self.method.code(),
            self.arrangement.code()
        )
    }
}

/// Read-only lookup contract used by the sizing search.
///
/// Implementors only expose raw tables; the lookups with their
/// not-found semantics are provided.
pub trait CableTables {
    /// Ampacity table for a scope, if present
    fn ampacity_table(&self, scope: &AmpacityScope) -> Option<&SectionTable<f64>>;

    /// Impedance table for a material and construction, if present
    fn impedance_table(&self, material: Material, construction: CableConstruction) -> Option<&SectionTable<Impedance>>;

    /// Environmental correction tables
    fn correction_tables(&self) -> &CorrectionTables;

    /// Whether the scope has at least one ampacity entry
    fn has_ampacity_scope(&self, scope: &AmpacityScope) -> bool {
        self.ampacity_table(scope).is_some_and(|t| !t.is_empty())
    }

    /// Base ampacity (A) at reference conditions
    fn ampacity(&self, scope: &AmpacityScope, section_mm2: f64) -> LookupResult<f64> {
        self.ampacity_table(scope)
            .and_then(|t| t.get(section_mm2))
            .copied()
            .ok_or_else(|| NotFound::ampacity(format!("{} at {} mm²", scope, format_section(section_mm2))))
    }

    /// Per-conductor impedance for voltage-drop purposes.
    ///
    /// Always read from the multicore table, whatever the arrangement or the
    /// real core count of the installed cable.
    fn impedance(
        &self,
        material: Material,
        arrangement: ConductorArrangement,
        section_mm2: f64,
    ) -> LookupResult<Impedance> {
        self.impedance_table(material, CableConstruction::Multicore)
            .and_then(|t| t.get(section_mm2))
            .copied()
            .ok_or_else(|| {
                NotFound::impedance(format!(
                    "{} {} multicore at {} mm²",
                    material.code(),
                    arrangement.code(),
                    format_section(section_mm2)
                ))
            })
    }

    /// Candidate cross-sections for a scope, ascending by numeric value.
    ///
    /// Union of the ampacity scope and the material's multicore impedance
    /// keys, so a gap in either table shows up as a skipped candidate.
    fn cross_sections(&self, scope: &AmpacityScope) -> Vec<f64> {
        let mut sections: Vec<f64> = self
            .ampacity_table(scope)
            .map(|t| t.sections())
            .unwrap_or_default();
        if let Some(table) = self.impedance_table(scope.material, CableConstruction::Multicore) {
            sections.extend(table.sections());
        }
        sections.sort_by(f64::total_cmp);
        sections.dedup_by(|a, b| (*a - *b).abs() < KEY_EPSILON);
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_sorted_numerically() {
        // Lexicographic order would put "10" before "2.5"
        let table: SectionTable<f64> = KeyedTable::new().with(10.0, 57.0).with(2.5, 24.0).with(120.0, 299.0);
        assert_eq!(table.sections(), vec![2.5, 10.0, 120.0]);
        assert_eq!(table.largest().map(|(k, _)| k), Some(120.0));
    }

    #[test]
    fn test_get_by_numeric_key() {
        let mut table: LevelTable = KeyedTable::new();
        table.0.insert("1.0".to_string(), 0.98);
        assert_eq!(table.factor(1.0), Some(0.98));
        assert_eq!(table.factor(1.2), None);
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        let mut table: LevelTable = KeyedTable::new();
        table.0.insert("abc".to_string(), 1.0);
        let err = table.validate("grouping").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TABLE");
    }

    #[test]
    fn test_validate_rejects_non_positive_values() {
        let table: LevelTable = KeyedTable::new().with(2.0, 0.0);
        assert!(table.validate("grouping").is_err());
    }

    #[test]
    fn test_parallel_impedance() {
        let z = Impedance::new(0.188, 0.074).parallel(2);
        assert!((z.r_ohm_km - 0.094).abs() < 1e-12);
        assert!((z.x_ohm_km - 0.037).abs() < 1e-12);
    }
}
