//! Lookup database schema and loaders.
//!
//! The engine never writes to a [`CableDatabase`]; it is deserialized once
//! (from TOML or JSON) and shared read-only.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{validate_values, AmpacityScope, CableTables, Impedance, LevelTable, SectionTable};
use crate::conductors::{CableConstruction, ConductorArrangement, Environment, Material};
use crate::errors::{CalcError, CalcResult};

/// Ampacity tables for one installation method, split by loaded conductors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrangementTables {
    #[serde(default)]
    pub two_wire: SectionTable<f64>,
    #[serde(default)]
    pub three_wire: SectionTable<f64>,
}

impl ArrangementTables {
    pub fn for_arrangement(&self, arrangement: ConductorArrangement) -> &SectionTable<f64> {
        match arrangement {
            ConductorArrangement::TwoWire => &self.two_wire,
            ConductorArrangement::ThreeWire => &self.three_wire,
        }
    }
}

/// Impedance tables for one material
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceTables {
    #[serde(default)]
    pub multicore: SectionTable<Impedance>,
    #[serde(default)]
    pub single_core: SectionTable<Impedance>,
}

impl ImpedanceTables {
    pub fn for_construction(&self, construction: CableConstruction) -> &SectionTable<Impedance> {
        match construction {
            CableConstruction::Multicore => &self.multicore,
            CableConstruction::SingleCore => &self.single_core,
        }
    }
}

/// Correction tables for one environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentCorrections {
    /// Insulation code → ambient temperature (°C) → k1
    #[serde(default)]
    pub temperature: BTreeMap<String, LevelTable>,
    /// Circuits in the group → k2
    #[serde(default)]
    pub grouping: LevelTable,
    /// Laying depth (m) → k3, buried only
    #[serde(default)]
    pub depth: LevelTable,
    /// Soil thermal resistivity (K·m/W) → k4, buried only
    #[serde(default)]
    pub soil_resistivity: LevelTable,
}

/// Correction tables for every environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionTables {
    #[serde(default)]
    pub air: EnvironmentCorrections,
    #[serde(default)]
    pub buried: EnvironmentCorrections,
}

impl CorrectionTables {
    pub fn for_environment(&self, environment: Environment) -> &EnvironmentCorrections {
        match environment {
            Environment::Air => &self.air,
            Environment::Buried => &self.buried,
        }
    }
}

type MethodTables = BTreeMap<String, ArrangementTables>;
type MaterialTables = BTreeMap<String, MethodTables>;
type InsulationTables = BTreeMap<String, MaterialTables>;

/// Complete lookup database.
///
/// ## TOML Example
///
/// ```toml
/// version = "2024.1"
///
/// [ampacity.LV.PVC.copper.C]
/// two_wire = { "1.5" = 19.5, "2.5" = 27.0 }
///
/// [impedance.copper.multicore]
/// "1.5" = { r = 14.8, x = 0.118 }
///
/// [correction.air.grouping]
/// "1" = 1.0
/// "2" = 0.8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CableDatabase {
    /// Data set version label
    #[serde(default)]
    pub version: String,

    /// tension → insulation → material → method → arrangement tables
    #[serde(default)]
    pub ampacity: BTreeMap<String, InsulationTables>,

    /// material → construction tables
    #[serde(default)]
    pub impedance: BTreeMap<String, ImpedanceTables>,

    #[serde(default)]
    pub correction: CorrectionTables,
}

impl CableDatabase {
    /// Parse and validate a TOML database
    pub fn from_toml(content: &str) -> CalcResult<Self> {
        let db: CableDatabase =
            toml::from_str(content).map_err(|e| CalcError::serialization(format!("Invalid database TOML: {}", e)))?;
        db.validate()?;
        Ok(db)
    }

    /// Parse and validate a JSON database
    pub fn from_json(content: &str) -> CalcResult<Self> {
        let db: CableDatabase = serde_json::from_str(content)
            .map_err(|e| CalcError::serialization(format!("Invalid database JSON: {}", e)))?;
        db.validate()?;
        Ok(db)
    }

    /// Load a database file; `.json` is parsed as JSON, anything else as TOML
    pub fn from_file(path: &Path) -> CalcResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CalcError::file_error("read database", path.display().to_string(), e.to_string()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Check every key is numeric and every value positive
    pub fn validate(&self) -> CalcResult<()> {
        for (tension, insulations) in &self.ampacity {
            for (insulation, materials) in insulations {
                for (material, methods) in materials {
                    for (method, tables) in methods {
                        for (arrangement, table) in [("two_wire", &tables.two_wire), ("three_wire", &tables.three_wire)] {
                            let name = format!("ampacity {}/{}/{}/{}/{}", tension, insulation, material, method, arrangement);
                            table.validate_keys(&name)?;
                            validate_values(&name, table.0.iter().map(|(k, v)| (k.as_str(), *v)))?;
                        }
                    }
                }
            }
        }

        for (material, tables) in &self.impedance {
            for (construction, table) in [("multicore", &tables.multicore), ("single_core", &tables.single_core)] {
                let name = format!("impedance {}/{}", material, construction);
                table.validate_keys(&name)?;
                validate_values(&name, table.0.iter().map(|(k, z)| (k.as_str(), z.r_ohm_km)))?;
                for (key, z) in &table.0 {
                    if !z.x_ohm_km.is_finite() || z.x_ohm_km < 0.0 {
                        return Err(CalcError::invalid_table(
                            &name,
                            format!("reactance {} at key '{}' must be non-negative", z.x_ohm_km, key),
                        ));
                    }
                }
            }
        }

        for (env, corrections) in [("air", &self.correction.air), ("buried", &self.correction.buried)] {
            for (insulation, table) in &corrections.temperature {
                table.validate(&format!("correction {}/temperature/{}", env, insulation))?;
            }
            corrections.grouping.validate(&format!("correction {}/grouping", env))?;
            corrections.depth.validate(&format!("correction {}/depth", env))?;
            corrections
                .soil_resistivity
                .validate(&format!("correction {}/soil_resistivity", env))?;
        }

        Ok(())
    }

    /// Insert or replace one ampacity table
    pub fn set_ampacity(&mut self, scope: &AmpacityScope, table: SectionTable<f64>) {
        let tables = self
            .ampacity
            .entry(scope.tension.code().to_string())
            .or_default()
            .entry(scope.insulation.code().to_string())
            .or_default()
            .entry(scope.material.code().to_string())
            .or_default()
            .entry(scope.method.code().to_string())
            .or_default();
        match scope.arrangement {
            ConductorArrangement::TwoWire => tables.two_wire = table,
            ConductorArrangement::ThreeWire => tables.three_wire = table,
        }
    }

    /// Insert or replace one impedance table
    pub fn set_impedance(&mut self, material: Material, construction: CableConstruction, table: SectionTable<Impedance>) {
        let tables = self.impedance.entry(material.code().to_string()).or_default();
        match construction {
            CableConstruction::Multicore => tables.multicore = table,
            CableConstruction::SingleCore => tables.single_core = table,
        }
    }
}

impl CableTables for CableDatabase {
    fn ampacity_table(&self, scope: &AmpacityScope) -> Option<&SectionTable<f64>> {
        self.ampacity
            .get(scope.tension.code())?
            .get(scope.insulation.code())?
            .get(scope.material.code())?
            .get(scope.method.code())
            .map(|tables| tables.for_arrangement(scope.arrangement))
    }

    fn impedance_table(&self, material: Material, construction: CableConstruction) -> Option<&SectionTable<Impedance>> {
        self.impedance
            .get(material.code())
            .map(|tables| tables.for_construction(construction))
    }

    fn correction_tables(&self) -> &CorrectionTables {
        &self.correction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductors::{InstallationMethod, InsulationClass, TensionCategory};
    use crate::errors::TableKind;
    use crate::tables::KeyedTable;

    const SMALL_DB: &str = r#"
version = "test"

[ampacity.LV.PVC.copper.C]
two_wire = { "10" = 63.0, "1.5" = 19.5, "2.5" = 27.0 }

[impedance.copper.multicore]
"1.5" = { r = 14.8, x = 0.118 }
"2.5" = { r = 8.91, x = 0.109 }
"4" = { r = 5.57, x = 0.101 }

[correction.air.grouping]
"1" = 1.0
"2" = 0.8
"#;

    fn scope() -> AmpacityScope {
        AmpacityScope {
            tension: TensionCategory::LowVoltage,
            insulation: InsulationClass::Pvc,
            material: Material::Copper,
            method: InstallationMethod::C,
            arrangement: ConductorArrangement::TwoWire,
        }
    }

    #[test]
    fn test_parse_toml() {
        let db = CableDatabase::from_toml(SMALL_DB).unwrap();
        assert_eq!(db.version, "test");
        assert_eq!(db.ampacity(&scope(), 2.5), Ok(27.0));
        let z = db.impedance(Material::Copper, ConductorArrangement::TwoWire, 4.0).unwrap();
        assert_eq!(z.r_ohm_km, 5.57);
    }

    #[test]
    fn test_missing_entries_are_not_found() {
        let db = CableDatabase::from_toml(SMALL_DB).unwrap();
        let err = db.ampacity(&scope(), 4.0).unwrap_err();
        assert_eq!(err.table, TableKind::Ampacity);
        let err = db
            .impedance(Material::Copper, ConductorArrangement::TwoWire, 10.0)
            .unwrap_err();
        assert_eq!(err.table, TableKind::Impedance);
    }

    #[test]
    fn test_cross_sections_union_sorted() {
        let db = CableDatabase::from_toml(SMALL_DB).unwrap();
        assert_eq!(db.cross_sections(&scope()), vec![1.5, 2.5, 4.0, 10.0]);
    }

    #[test]
    fn test_missing_scope() {
        let db = CableDatabase::from_toml(SMALL_DB).unwrap();
        let mut other = scope();
        other.method = InstallationMethod::E;
        assert!(!db.has_ampacity_scope(&other));
        other = scope();
        other.arrangement = ConductorArrangement::ThreeWire;
        assert!(!db.has_ampacity_scope(&other));
        assert!(db.has_ampacity_scope(&scope()));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let bad = r#"
[ampacity.LV.PVC.copper.C]
two_wire = { "big" = 19.5 }
"#;
        let err = CableDatabase::from_toml(bad).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TABLE");
    }

    #[test]
    fn test_json_roundtrip() {
        let mut db = CableDatabase::default();
        db.set_ampacity(&scope(), KeyedTable::new().with(2.5, 27.0));
        db.set_impedance(
            Material::Copper,
            CableConstruction::Multicore,
            KeyedTable::new().with(2.5, Impedance::new(8.91, 0.109)),
        );
        let json = serde_json::to_string(&db).unwrap();
        let loaded = CableDatabase::from_json(&json).unwrap();
        assert_eq!(loaded, db);
    }
}
