//! # Conductor and Installation Definitions
//!
//! The keys every table in the lookup database is indexed by: conductor
//! material, insulation class, tension category and installation method,
//! plus the phase system that decides how many conductors are loaded.
//!
//! Each enum carries a `code()` that matches the key used in the database
//! files, a `display_name()` for reports and a `from_str_flexible()` parser
//! for user input.
//!
//! ## Example
//!
//! ```rust
//! use cable_core::conductors::{InstallationMethod, Material, PhaseSystem, ConductorArrangement};
//!
//! let method = InstallationMethod::from_str_flexible("d1").unwrap();
//! assert!(method.is_buried());
//! assert_eq!(Material::Aluminum.code(), "aluminum");
//! assert_eq!(PhaseSystem::ThreePhase.arrangement(), ConductorArrangement::ThreeWire);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

/// Smallest aluminium cross-section the search will ever propose (mm²).
///
/// This is an installation rule, so it holds even when the table lists
/// smaller aluminium sections.
pub const ALUMINUM_MIN_SECTION_MM2: f64 = 10.0;

/// Conductor material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    #[default]
    Copper,
    Aluminum,
}

impl Material {
    /// All materials for UI selection
    pub const ALL: [Material; 2] = [Material::Copper, Material::Aluminum];

    /// Database key
    pub fn code(&self) -> &'static str {
        match self {
            Material::Copper => "copper",
            Material::Aluminum => "aluminum",
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Material::Copper => "Copper",
            Material::Aluminum => "Aluminium",
        }
    }

    /// Smallest section this material may be sized to, if any policy applies
    pub fn min_section_mm2(&self) -> Option<f64> {
        match self {
            Material::Copper => None,
            Material::Aluminum => Some(ALUMINUM_MIN_SECTION_MM2),
        }
    }

    /// Parse from common string representations
    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "copper" | "cu" | "rame" => Ok(Material::Copper),
            "aluminum" | "aluminium" | "al" | "alluminio" => Ok(Material::Aluminum),
            _ => Err(CalcError::invalid_input("material", s, "Expected copper or aluminum")),
        }
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Insulation class, which fixes the maximum conductor operating temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InsulationClass {
    /// PVC, 70 °C conductor temperature
    #[default]
    #[serde(rename = "PVC")]
    Pvc,
    /// EPR / XLPE, 90 °C conductor temperature
    #[serde(rename = "EPR")]
    Epr,
}

impl InsulationClass {
    /// All insulation classes for UI selection
    pub const ALL: [InsulationClass; 2] = [InsulationClass::Pvc, InsulationClass::Epr];

    /// Database key
    pub fn code(&self) -> &'static str {
        match self {
            InsulationClass::Pvc => "PVC",
            InsulationClass::Epr => "EPR",
        }
    }

    /// Maximum continuous conductor temperature (°C)
    pub fn max_conductor_temperature_c(&self) -> f64 {
        match self {
            InsulationClass::Pvc => 70.0,
            InsulationClass::Epr => 90.0,
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            InsulationClass::Pvc => "PVC (70 °C)",
            InsulationClass::Epr => "EPR/XLPE (90 °C)",
        }
    }

    /// Parse from common string representations
    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "PVC" | "PVC70" => Ok(InsulationClass::Pvc),
            "EPR" | "XLPE" | "HEPR" | "EPR90" => Ok(InsulationClass::Epr),
            _ => Err(CalcError::invalid_input("insulation", s, "Expected PVC or EPR/XLPE")),
        }
    }
}

impl std::fmt::Display for InsulationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Tension (voltage) category of the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TensionCategory {
    /// Low voltage (≤ 1 kV)
    #[default]
    #[serde(rename = "LV")]
    LowVoltage,
    /// Medium voltage (1 kV - 35 kV)
    #[serde(rename = "MV")]
    MediumVoltage,
}

impl TensionCategory {
    pub const ALL: [TensionCategory; 2] = [TensionCategory::LowVoltage, TensionCategory::MediumVoltage];

    /// Database key
    pub fn code(&self) -> &'static str {
        match self {
            TensionCategory::LowVoltage => "LV",
            TensionCategory::MediumVoltage => "MV",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TensionCategory::LowVoltage => "Low voltage",
            TensionCategory::MediumVoltage => "Medium voltage",
        }
    }

    /// Whether correction-factor tables exist for this category.
    ///
    /// The database only carries correction tables for low voltage; medium
    /// voltage sizing runs with every k-factor at 1.0.
    pub fn has_correction_tables(&self) -> bool {
        matches!(self, TensionCategory::LowVoltage)
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "LV" | "BT" | "LOW" => Ok(TensionCategory::LowVoltage),
            "MV" | "MT" | "MEDIUM" => Ok(TensionCategory::MediumVoltage),
            _ => Err(CalcError::invalid_input("tension", s, "Expected LV or MV")),
        }
    }
}

impl std::fmt::Display for TensionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Reference installation methods (IEC 60364-5-52 Table B.52.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InstallationMethod {
    /// Insulated conductors in conduit in a thermally insulated wall
    A1,
    /// Multi-core cable in conduit in a thermally insulated wall
    A2,
    /// Insulated conductors in conduit on a wooden or masonry wall
    B1,
    /// Multi-core cable in conduit on a wooden or masonry wall
    B2,
    /// Single or multi-core cable on a wooden or masonry wall
    #[default]
    C,
    /// Multi-core cable in free air or on perforated tray
    E,
    /// Single-core cables touching, in free air or on perforated tray
    F,
    /// Multi-core or single-core cables in ducts in the ground
    D1,
    /// Multi-core or single-core cables direct in the ground
    D2,
}

impl InstallationMethod {
    pub const ALL: [InstallationMethod; 9] = [
        InstallationMethod::A1,
        InstallationMethod::A2,
        InstallationMethod::B1,
        InstallationMethod::B2,
        InstallationMethod::C,
        InstallationMethod::E,
        InstallationMethod::F,
        InstallationMethod::D1,
        InstallationMethod::D2,
    ];

    /// Database key
    pub fn code(&self) -> &'static str {
        match self {
            InstallationMethod::A1 => "A1",
            InstallationMethod::A2 => "A2",
            InstallationMethod::B1 => "B1",
            InstallationMethod::B2 => "B2",
            InstallationMethod::C => "C",
            InstallationMethod::E => "E",
            InstallationMethod::F => "F",
            InstallationMethod::D1 => "D1",
            InstallationMethod::D2 => "D2",
        }
    }

    /// Underground routing. All "D" methods are buried.
    pub fn is_buried(&self) -> bool {
        self.code().starts_with('D')
    }

    /// Environment whose correction tables apply
    pub fn environment(&self) -> Environment {
        if self.is_buried() {
            Environment::Buried
        } else {
            Environment::Air
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InstallationMethod::A1 => "Conductors in conduit, thermally insulated wall",
            InstallationMethod::A2 => "Multi-core cable in conduit, thermally insulated wall",
            InstallationMethod::B1 => "Conductors in conduit on wall",
            InstallationMethod::B2 => "Multi-core cable in conduit on wall",
            InstallationMethod::C => "Cable clipped direct to wall",
            InstallationMethod::E => "Multi-core cable in free air / perforated tray",
            InstallationMethod::F => "Single-core cables in free air / perforated tray",
            InstallationMethod::D1 => "Cables in ducts in the ground",
            InstallationMethod::D2 => "Cables direct in the ground",
        }
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        let code = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.code() == code)
            .ok_or_else(|| CalcError::invalid_input("installation_method", s, "Unknown installation method code"))
    }
}

impl std::fmt::Display for InstallationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.code(), self.description())
    }
}

/// Where the cable runs, for correction-factor purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Air,
    Buried,
}

impl Environment {
    /// Largest effective group size with a tabulated grouping factor
    pub fn grouping_cap(&self) -> u32 {
        match self {
            Environment::Air => 6,
            Environment::Buried => 5,
        }
    }

    /// Reference ambient temperature (°C) at which k1 = 1.0
    pub fn reference_temperature_c(&self) -> f64 {
        match self {
            Environment::Air => 30.0,
            Environment::Buried => 20.0,
        }
    }
}

/// Single-phase or three-phase supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSystem {
    #[default]
    SinglePhase,
    ThreePhase,
}

impl PhaseSystem {
    pub fn is_three_phase(&self) -> bool {
        matches!(self, PhaseSystem::ThreePhase)
    }

    /// Loaded conductor arrangement used for ampacity and impedance lookups
    pub fn arrangement(&self) -> ConductorArrangement {
        match self {
            PhaseSystem::SinglePhase => ConductorArrangement::TwoWire,
            PhaseSystem::ThreePhase => ConductorArrangement::ThreeWire,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PhaseSystem::SinglePhase => "Single-phase",
            PhaseSystem::ThreePhase => "Three-phase",
        }
    }

    pub fn from_str_flexible(s: &str) -> CalcResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "single" | "single-phase" | "mono" | "monofase" => Ok(PhaseSystem::SinglePhase),
            "3" | "three" | "three-phase" | "tri" | "trifase" => Ok(PhaseSystem::ThreePhase),
            _ => Err(CalcError::invalid_input("phase", s, "Expected single or three")),
        }
    }
}

impl std::fmt::Display for PhaseSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Number of loaded conductors in the circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConductorArrangement {
    TwoWire,
    ThreeWire,
}

impl ConductorArrangement {
    pub fn code(&self) -> &'static str {
        match self {
            ConductorArrangement::TwoWire => "two_wire",
            ConductorArrangement::ThreeWire => "three_wire",
        }
    }
}

/// Physical cable construction the impedance table refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableConstruction {
    /// Cabled multi-core
    Multicore,
    /// Single-core cables laid separately
    SingleCore,
}

impl CableConstruction {
    pub fn code(&self) -> &'static str {
        match self {
            CableConstruction::Multicore => "multicore",
            CableConstruction::SingleCore => "single_core",
        }
    }
}

/// Format a cross-section the way tables and reports show it ("2.5", "120")
pub fn format_section(section_mm2: f64) -> String {
    if section_mm2.fract() == 0.0 {
        format!("{:.0}", section_mm2)
    } else {
        format!("{}", section_mm2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buried_methods() {
        assert!(InstallationMethod::D1.is_buried());
        assert!(InstallationMethod::D2.is_buried());
        assert!(!InstallationMethod::E.is_buried());
        assert_eq!(InstallationMethod::C.environment(), Environment::Air);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(InstallationMethod::from_str_flexible("b1").unwrap(), InstallationMethod::B1);
        assert!(InstallationMethod::from_str_flexible("Z9").is_err());
    }

    #[test]
    fn test_material_parsing() {
        assert_eq!(Material::from_str_flexible("Cu").unwrap(), Material::Copper);
        assert_eq!(Material::from_str_flexible("aluminium").unwrap(), Material::Aluminum);
        assert!(Material::from_str_flexible("gold").is_err());
    }

    #[test]
    fn test_aluminum_floor() {
        assert_eq!(Material::Aluminum.min_section_mm2(), Some(10.0));
        assert_eq!(Material::Copper.min_section_mm2(), None);
    }

    #[test]
    fn test_serialization_codes() {
        assert_eq!(serde_json::to_string(&InsulationClass::Epr).unwrap(), "\"EPR\"");
        assert_eq!(serde_json::to_string(&TensionCategory::MediumVoltage).unwrap(), "\"MV\"");
        assert_eq!(serde_json::to_string(&Material::Aluminum).unwrap(), "\"aluminum\"");
    }

    #[test]
    fn test_format_section() {
        assert_eq!(format_section(2.5), "2.5");
        assert_eq!(format_section(120.0), "120");
    }
}
