//! Embedded reference database.
//!
//! `data/reference_tables.toml` is compiled into the crate and parsed on first
//! use. Callers with their own tables load them through
//! [`CableDatabase::from_file`] instead.

use once_cell::sync::Lazy;

use super::CableDatabase;
use crate::errors::CalcResult;

const REFERENCE_TOML: &str = include_str!("../../data/reference_tables.toml");

static REFERENCE: Lazy<CalcResult<CableDatabase>> = Lazy::new(|| CableDatabase::from_toml(REFERENCE_TOML));

/// The built-in IEC-style reference tables, parsed once.
///
/// # Example
///
/// ```rust
/// use cable_core::tables::reference_database;
///
/// let db = reference_database().unwrap();
/// assert!(!db.version.is_empty());
/// ```
pub fn reference_database() -> CalcResult<&'static CableDatabase> {
    REFERENCE.as_ref().map_err(Clone::clone)
}

impl CableDatabase {
    /// Shorthand for [`reference_database`].
    pub fn reference() -> CalcResult<&'static CableDatabase> {
        reference_database()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductors::{
        CableConstruction, ConductorArrangement, InstallationMethod, InsulationClass, Material, TensionCategory,
    };
    use crate::tables::{AmpacityScope, CableTables};

    #[test]
    fn test_reference_parses() {
        let db = reference_database().unwrap();
        assert_eq!(db.version, "2024.1");
        assert!(std::ptr::eq(db, CableDatabase::reference().unwrap()));
    }

    #[test]
    fn test_reference_copper_pvc_c() {
        let db = reference_database().unwrap();
        let scope = AmpacityScope {
            tension: TensionCategory::LowVoltage,
            insulation: InsulationClass::Pvc,
            material: Material::Copper,
            method: InstallationMethod::C,
            arrangement: ConductorArrangement::TwoWire,
        };
        assert_eq!(db.ampacity(&scope, 2.5), Ok(27.0));
        let sections = db.cross_sections(&scope);
        assert_eq!(sections.first(), Some(&1.5));
        assert_eq!(sections.last(), Some(&240.0));
        assert_eq!(sections.len(), 15);
    }

    #[test]
    fn test_reference_aluminum_keeps_small_sections() {
        let db = reference_database().unwrap();
        let table = db
            .impedance_table(Material::Aluminum, CableConstruction::Multicore)
            .unwrap();
        assert!(table.get(4.0).is_some());
    }

    #[test]
    fn test_reference_medium_voltage_three_wire_only() {
        let db = reference_database().unwrap();
        let mut scope = AmpacityScope {
            tension: TensionCategory::MediumVoltage,
            insulation: InsulationClass::Epr,
            material: Material::Copper,
            method: InstallationMethod::D1,
            arrangement: ConductorArrangement::ThreeWire,
        };
        assert!(db.has_ampacity_scope(&scope));
        scope.arrangement = ConductorArrangement::TwoWire;
        assert!(!db.has_ampacity_scope(&scope));
    }

    #[test]
    fn test_reference_buried_corrections_present() {
        let db = reference_database().unwrap();
        let buried = &db.correction.buried;
        assert_eq!(buried.depth.factor(0.8), Some(1.0));
        assert_eq!(buried.soil_resistivity.factor(2.0), Some(0.9));
        assert_eq!(buried.grouping.largest().map(|(k, _)| k), Some(5.0));
    }
}
