//! # Settings
//!
//! Defaults for new calculations plus file locations, read from TOML.
//! Every field has a default, so a partial file (or none at all) works.
//!
//! ## TOML Example
//!
//! ```toml
//! [defaults]
//! voltage_v = 400.0
//! installation_method = "E"
//! allow_auto_parallel = true
//!
//! [site]
//! air_temperature_c = 35.0
//!
//! [files]
//! archive = "/srv/projects/cablesizer.csz"
//! database = "/srv/projects/tables.toml"
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::{CableSizingInput, LoadSpec};
use crate::conductors::{Environment, InstallationMethod, InsulationClass, Material, PhaseSystem, TensionCategory};
use crate::derating::{DeratingConditions, DeratingSource};
use crate::errors::{CalcError, CalcResult};
use crate::tables::{reference_database, CableDatabase};

/// Root settings document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: FormDefaults,
    pub site: SiteConditions,
    pub files: FileSettings,
}

/// Values a new sizing form starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefaults {
    pub voltage_v: f64,
    pub phase: PhaseSystem,
    pub power_factor: f64,
    pub max_voltage_drop_percent: f64,
    pub material: Material,
    pub insulation: InsulationClass,
    pub tension: TensionCategory,
    pub installation_method: InstallationMethod,
    pub base_parallel_runs: u32,
    pub allow_auto_parallel: bool,
}

impl Default for FormDefaults {
    fn default() -> Self {
        FormDefaults {
            voltage_v: 230.0,
            phase: PhaseSystem::SinglePhase,
            power_factor: 0.9,
            max_voltage_drop_percent: 4.0,
            material: Material::Copper,
            insulation: InsulationClass::Pvc,
            tension: TensionCategory::LowVoltage,
            installation_method: InstallationMethod::C,
            base_parallel_runs: 1,
            allow_auto_parallel: false,
        }
    }
}

/// Installation conditions applied unless a form overrides them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConditions {
    /// Ambient air temperature (°C)
    pub air_temperature_c: f64,
    /// Ground temperature (°C)
    pub ground_temperature_c: f64,
    /// Laying depth (m)
    pub burial_depth_m: f64,
    /// Soil thermal resistivity (K·m/W)
    pub soil_resistivity_km_w: f64,
    /// Circuits laid together
    pub grouping_count: u32,
}

impl Default for SiteConditions {
    fn default() -> Self {
        SiteConditions {
            air_temperature_c: Environment::Air.reference_temperature_c(),
            ground_temperature_c: Environment::Buried.reference_temperature_c(),
            burial_depth_m: 0.8,
            soil_resistivity_km_w: 1.5,
            grouping_count: 1,
        }
    }
}

impl SiteConditions {
    /// Conditions for one environment; depth and soil only apply underground
    pub fn derating_conditions(&self, environment: Environment) -> DeratingConditions {
        match environment {
            Environment::Air => DeratingConditions {
                ambient_temperature_c: Some(self.air_temperature_c),
                grouping_count: self.grouping_count,
                burial_depth_m: None,
                soil_resistivity_km_w: None,
            },
            Environment::Buried => DeratingConditions {
                ambient_temperature_c: Some(self.ground_temperature_c),
                grouping_count: self.grouping_count,
                burial_depth_m: Some(self.burial_depth_m),
                soil_resistivity_km_w: Some(self.soil_resistivity_km_w),
            },
        }
    }
}

/// Where the archive and an optional replacement database live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub archive: PathBuf,
    /// Replaces the embedded reference tables when set
    pub database: Option<PathBuf>,
    /// Name written into archive lock files
    pub user: Option<String>,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            archive: PathBuf::from("cablesizer.csz"),
            database: None,
            user: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> CalcResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CalcError::file_error("read settings", path.display().to_string(), e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Load settings, or use the defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> CalcResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.display(), "no settings file, using defaults");
            Ok(Settings::default())
        }
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> CalcResult<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| CalcError::serialization(format!("Invalid settings TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> CalcResult<String> {
        toml::to_string_pretty(self).map_err(|e| CalcError::serialization(e.to_string()))
    }

    /// Reject defaults that could never produce a valid form
    pub fn validate(&self) -> CalcResult<()> {
        let d = &self.defaults;
        for (field, value) in [
            ("defaults.voltage_v", d.voltage_v),
            ("defaults.max_voltage_drop_percent", d.max_voltage_drop_percent),
            ("site.burial_depth_m", self.site.burial_depth_m),
            ("site.soil_resistivity_km_w", self.site.soil_resistivity_km_w),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CalcError::invalid_input(field, value.to_string(), "Must be positive"));
            }
        }
        if !(d.power_factor > 0.0 && d.power_factor <= 1.0) {
            return Err(CalcError::invalid_input(
                "defaults.power_factor",
                d.power_factor.to_string(),
                "Power factor must be in (0, 1]",
            ));
        }
        if d.base_parallel_runs == 0 {
            return Err(CalcError::invalid_input(
                "defaults.base_parallel_runs",
                "0",
                "At least one conductor per phase is required",
            ));
        }
        Ok(())
    }

    /// A sizing form prefilled from these settings.
    ///
    /// Site conditions are picked for the environment of the default method.
    pub fn sizing_template(&self) -> CableSizingInput {
        let d = &self.defaults;
        CableSizingInput {
            label: String::new(),
            voltage_v: d.voltage_v,
            phase: d.phase,
            load: LoadSpec::default(),
            length_m: 0.0,
            power_factor: d.power_factor,
            max_voltage_drop_percent: d.max_voltage_drop_percent,
            material: d.material,
            insulation: d.insulation,
            tension: d.tension,
            installation_method: d.installation_method,
            derating: DeratingSource::Conditions(
                self.site
                    .derating_conditions(d.installation_method.environment()),
            ),
            base_parallel_runs: d.base_parallel_runs,
            allow_auto_parallel: d.allow_auto_parallel,
        }
    }

    /// The configured database, or the embedded reference tables
    pub fn database(&self) -> CalcResult<Cow<'static, CableDatabase>> {
        match &self.files.database {
            Some(path) => {
                debug!(path = %path.display(), "loading database");
                CableDatabase::from_file(path).map(Cow::Owned)
            }
            None => reference_database().map(Cow::Borrowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.defaults.voltage_v, 230.0);
        assert_eq!(settings.defaults.power_factor, 0.9);
        assert_eq!(settings.defaults.max_voltage_drop_percent, 4.0);
        assert_eq!(settings.site.air_temperature_c, 30.0);
        assert_eq!(settings.site.ground_temperature_c, 20.0);
        assert_eq!(settings.files.archive, PathBuf::from("cablesizer.csz"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml(
            r#"
[defaults]
voltage_v = 400.0
phase = "three_phase"
installation_method = "D1"
insulation = "EPR"

[site]
ground_temperature_c = 25.0
"#,
        )
        .unwrap();
        assert_eq!(settings.defaults.voltage_v, 400.0);
        assert_eq!(settings.defaults.phase, PhaseSystem::ThreePhase);
        assert_eq!(settings.defaults.installation_method, InstallationMethod::D1);
        assert_eq!(settings.defaults.power_factor, 0.9);
        assert_eq!(settings.site.ground_temperature_c, 25.0);

        let form = settings.sizing_template();
        match form.derating {
            DeratingSource::Conditions(c) => {
                assert_eq!(c.ambient_temperature_c, Some(25.0));
                assert_eq!(c.burial_depth_m, Some(0.8));
            }
            other => panic!("unexpected derating source {:?}", other),
        }
    }

    #[test]
    fn test_air_conditions_skip_ground_levels() {
        let c = SiteConditions::default().derating_conditions(Environment::Air);
        assert_eq!(c.ambient_temperature_c, Some(30.0));
        assert_eq!(c.burial_depth_m, None);
        assert_eq!(c.soil_resistivity_km_w, None);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = Settings::from_toml("[defaults]\npower_factor = 1.3\n").unwrap_err();
        assert!(err.is_input_error());
        let err = Settings::from_toml("[defaults]\nvoltage_v = \"high\"\n").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut settings = Settings::default();
        settings.files.database = Some(PathBuf::from("tables.toml"));
        let text = settings.to_toml().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn test_default_database_is_reference() {
        let db = Settings::default().database().unwrap();
        assert!(matches!(db, Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("cablesizer_no_such_settings.toml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(Settings::load_or_default(&path).unwrap(), Settings::default());
    }
}
