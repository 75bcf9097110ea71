//! # Result Presenter
//!
//! Projects calculation results into self-describing records for display,
//! JSON export and the PDF report. No engineering logic lives here.
//!
//! Numbers are kept at full precision; rounding happens only when a report
//! is rendered as text (see [`Report::input_rows`] and friends).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calculations::{CableSizingInput, DesignRequest, SizingResult, VoltageDropInput, VoltageDropResult};
use crate::conductors::format_section;
use crate::derating::DeratingFactors;

/// Overall verdict of a sizing report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// A configuration meets both constraints
    Compliant,
    /// Nothing in the tables meets both constraints
    NoCompliantSection,
}

impl ReportStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportStatus::Compliant => "COMPLIANT",
            ReportStatus::NoCompliantSection => "NO COMPLIANT SECTION",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Label / value pair as shown in a table
pub type ReportRow = (String, String);

/// Common shape of every printable report
pub trait Report {
    /// Heading of the report
    fn title(&self) -> String;
    /// Echoed inputs
    fn input_rows(&self) -> Vec<ReportRow>;
    /// Computed values
    fn result_rows(&self) -> Vec<ReportRow>;
    /// One-line verdict
    fn status_text(&self) -> String;
    /// Whether the verdict is favourable
    fn passes(&self) -> bool;
}

fn row(label: &str, value: String) -> ReportRow {
    (label.to_string(), value)
}

/// Display record of one sizing calculation.
///
/// ## JSON Example
///
/// ```json
/// {
///   "label": "Kitchen ring",
///   "phase": "Single-phase",
///   "voltage_v": 230.0,
///   "design_current_a": 16.0,
///   "length_m": 50.0,
///   "power_factor": 0.9,
///   "max_voltage_drop_percent": 4.0,
///   "conductor": "Copper / PVC / LV",
///   "installation_method": "C",
///   "section": "4 mm²",
///   "allowed_current_a": 36.0,
///   "voltage_drop_percent": 3.5179,
///   "utilisation_percent": 87.9,
///   "status": "compliant"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingReport {
    pub label: String,
    pub phase: String,
    pub voltage_v: f64,
    pub design_current_a: f64,
    pub length_m: f64,
    pub power_factor: f64,
    pub max_voltage_drop_percent: f64,
    /// "Copper / PVC / LV"
    pub conductor: String,
    pub installation_method: String,
    pub installation_description: String,
    pub auto_parallel: bool,
    /// "4 mm²", "2 × 120 mm²", or `None` when nothing complies
    pub section: Option<String>,
    pub section_mm2: Option<f64>,
    pub parallel_runs: Option<u32>,
    pub factors: Option<DeratingFactors>,
    pub allowed_current_a: Option<f64>,
    pub voltage_drop_v: Option<f64>,
    pub voltage_drop_percent: Option<f64>,
    /// Share of the permitted drop used, capped at 100 %
    pub utilisation_percent: Option<f64>,
    pub status: ReportStatus,
}

impl SizingReport {
    /// Build the display record from the form, the request it produced and the result.
    pub fn from_calculation(input: &CableSizingInput, request: &DesignRequest, result: &SizingResult) -> Self {
        let selection = result.selection;
        SizingReport {
            label: input.label.clone(),
            phase: request.phase.display_name().to_string(),
            voltage_v: request.voltage_v,
            design_current_a: result.design_current_a,
            length_m: request.length_m,
            power_factor: request.power_factor,
            max_voltage_drop_percent: request.max_voltage_drop_percent,
            conductor: format!(
                "{} / {} / {}",
                request.material.display_name(),
                request.insulation.code(),
                request.tension.code()
            ),
            installation_method: request.installation_method.code().to_string(),
            installation_description: request.installation_method.description().to_string(),
            auto_parallel: request.allow_auto_parallel,
            section: selection.map(|s| s.designation()),
            section_mm2: selection.map(|s| s.section_mm2),
            parallel_runs: selection.map(|s| s.parallel_runs),
            factors: selection.map(|s| s.factors),
            allowed_current_a: selection.map(|s| s.allowed_current_a),
            voltage_drop_v: selection.map(|s| s.voltage_drop_v),
            voltage_drop_percent: selection.map(|s| s.voltage_drop_percent),
            utilisation_percent: selection
                .map(|s| (s.voltage_drop_percent / request.max_voltage_drop_percent * 100.0).min(100.0)),
            status: if selection.is_some() {
                ReportStatus::Compliant
            } else {
                ReportStatus::NoCompliantSection
            },
        }
    }

    pub fn found(&self) -> bool {
        self.status == ReportStatus::Compliant
    }
}

impl Report for SizingReport {
    fn title(&self) -> String {
        "Cable Sizing".to_string()
    }

    fn input_rows(&self) -> Vec<ReportRow> {
        vec![
            row("Circuit", self.label.clone()),
            row("System", self.phase.clone()),
            row("Voltage", format!("{:.0} V", self.voltage_v)),
            row("Design current Ib", format!("{:.2} A", self.design_current_a)),
            row("Length", format!("{:.1} m", self.length_m)),
            row("Power factor", format!("{:.2}", self.power_factor)),
            row("Max voltage drop", format!("{:.2} %", self.max_voltage_drop_percent)),
            row("Conductor", self.conductor.clone()),
            row(
                "Installation",
                format!("{} ({})", self.installation_method, self.installation_description),
            ),
            row("Auto parallel", if self.auto_parallel { "yes" } else { "no" }.to_string()),
        ]
    }

    fn result_rows(&self) -> Vec<ReportRow> {
        let mut rows = vec![row(
            "Section",
            self.section.clone().unwrap_or_else(|| "not found".to_string()),
        )];
        if let Some(k) = self.factors {
            rows.push(row(
                "Derating k1·k2·k3·k4",
                format!(
                    "{:.2} · {:.2} · {:.2} · {:.2} = {:.3}",
                    k.k1_temperature,
                    k.k2_grouping,
                    k.k3_burial_depth,
                    k.k4_soil_resistivity,
                    k.total()
                ),
            ));
        }
        if let Some(iz) = self.allowed_current_a {
            rows.push(row("Allowed current Iz", format!("{:.1} A", iz)));
        }
        if let (Some(v), Some(pct)) = (self.voltage_drop_v, self.voltage_drop_percent) {
            rows.push(row("Voltage drop", format!("{:.2} V ({:.2} %)", v, pct)));
        }
        if let Some(u) = self.utilisation_percent {
            rows.push(row("Drop utilisation", format!("{:.0} %", u)));
        }
        rows
    }

    fn status_text(&self) -> String {
        self.status.display_name().to_string()
    }

    fn passes(&self) -> bool {
        self.found()
    }
}

/// Display record of a voltage-drop check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageDropReport {
    pub label: String,
    pub phase: String,
    pub voltage_v: f64,
    pub current_a: f64,
    pub length_m: f64,
    pub power_factor: f64,
    pub section: String,
    pub material: String,
    pub resistance_ohm_km: f64,
    pub reactance_ohm_km: f64,
    pub voltage_drop_v: f64,
    pub voltage_drop_percent: f64,
    pub max_voltage_drop_percent: Option<f64>,
    pub passes: Option<bool>,
}

impl VoltageDropReport {
    pub fn from_check(input: &VoltageDropInput, result: &VoltageDropResult) -> Self {
        let section = if input.parallel_runs > 1 {
            format!("{} × {} mm²", input.parallel_runs, format_section(input.section_mm2))
        } else {
            format!("{} mm²", format_section(input.section_mm2))
        };
        VoltageDropReport {
            label: input.label.clone(),
            phase: input.phase.display_name().to_string(),
            voltage_v: input.voltage_v,
            current_a: input.current_a,
            length_m: input.length_m,
            power_factor: input.power_factor,
            section,
            material: input.material.display_name().to_string(),
            resistance_ohm_km: result.impedance.r_ohm_km,
            reactance_ohm_km: result.impedance.x_ohm_km,
            voltage_drop_v: result.drop.volts,
            voltage_drop_percent: result.drop.percent,
            max_voltage_drop_percent: result.max_voltage_drop_percent,
            passes: result.passes(),
        }
    }
}

impl Report for VoltageDropReport {
    fn title(&self) -> String {
        "Voltage Drop Check".to_string()
    }

    fn input_rows(&self) -> Vec<ReportRow> {
        let mut rows = vec![
            row("Circuit", self.label.clone()),
            row("System", self.phase.clone()),
            row("Voltage", format!("{:.0} V", self.voltage_v)),
            row("Current", format!("{:.2} A", self.current_a)),
            row("Length", format!("{:.1} m", self.length_m)),
            row("Power factor", format!("{:.2}", self.power_factor)),
            row("Cable", format!("{} {}", self.material, self.section)),
        ];
        if let Some(max) = self.max_voltage_drop_percent {
            rows.push(row("Max voltage drop", format!("{:.2} %", max)));
        }
        rows
    }

    fn result_rows(&self) -> Vec<ReportRow> {
        vec![
            row(
                "R / X per conductor",
                format!("{} / {} Ω/km", self.resistance_ohm_km, self.reactance_ohm_km),
            ),
            row(
                "Voltage drop",
                format!("{:.2} V ({:.2} %)", self.voltage_drop_v, self.voltage_drop_percent),
            ),
        ]
    }

    fn status_text(&self) -> String {
        match self.passes {
            Some(true) => "WITHIN LIMIT",
            Some(false) => "LIMIT EXCEEDED",
            None => "NO LIMIT GIVEN",
        }
        .to_string()
    }

    fn passes(&self) -> bool {
        self.passes.unwrap_or(true)
    }
}

fn write_report(f: &mut fmt::Formatter<'_>, report: &impl Report) -> fmt::Result {
    let rows = report.input_rows();
    let results = report.result_rows();
    let width = rows
        .iter()
        .chain(results.iter())
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);

    writeln!(f, "{}", report.title())?;
    writeln!(f, "{}", "=".repeat(report.title().chars().count()))?;
    for (label, value) in &rows {
        writeln!(f, "{:width$}  {}", label, value, width = width)?;
    }
    writeln!(f)?;
    for (label, value) in &results {
        writeln!(f, "{:width$}  {}", label, value, width = width)?;
    }
    writeln!(f)?;
    write!(f, "{}", report.status_text())
}

impl fmt::Display for SizingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(f, self)
    }
}

impl fmt::Display for VoltageDropReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(f, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::{calculate, check_voltage_drop, LoadSpec};
    use crate::conductors::{InstallationMethod, Material, PhaseSystem};
    use crate::tables::reference_database;

    fn sizing_report(input: &CableSizingInput) -> SizingReport {
        let db = reference_database().unwrap();
        let request = input.design_request().unwrap();
        let result = calculate(input, db).unwrap();
        SizingReport::from_calculation(input, &request, &result)
    }

    #[test]
    fn test_compliant_report() {
        let input = CableSizingInput {
            label: "Kitchen ring".to_string(),
            load: LoadSpec::Current { amps: 16.0 },
            length_m: 50.0,
            ..CableSizingInput::default()
        };
        let report = sizing_report(&input);
        assert_eq!(report.status, ReportStatus::Compliant);
        assert_eq!(report.section.as_deref(), Some("4 mm²"));
        assert_eq!(report.conductor, "Copper / PVC / LV");

        let pct = report.voltage_drop_percent.unwrap();
        let utilisation = report.utilisation_percent.unwrap();
        assert!((utilisation - pct / 4.0 * 100.0).abs() < 1e-9);
        assert!(utilisation <= 100.0);

        let text = report.to_string();
        assert!(text.contains("4 mm²"));
        assert!(text.ends_with("COMPLIANT"));
    }

    #[test]
    fn test_parallel_designation() {
        let input = CableSizingInput {
            voltage_v: 400.0,
            phase: PhaseSystem::ThreePhase,
            load: LoadSpec::Current { amps: 600.0 },
            length_m: 20.0,
            installation_method: InstallationMethod::E,
            insulation: crate::conductors::InsulationClass::Epr,
            allow_auto_parallel: true,
            ..CableSizingInput::default()
        };
        let report = sizing_report(&input);
        assert_eq!(report.parallel_runs, Some(2));
        assert!(report.section.unwrap().starts_with("2 × "));
    }

    #[test]
    fn test_not_found_report() {
        let input = CableSizingInput {
            load: LoadSpec::Current { amps: 200.0 },
            length_m: 500.0,
            max_voltage_drop_percent: 0.01,
            ..CableSizingInput::default()
        };
        let report = sizing_report(&input);
        assert!(!report.found());
        assert_eq!(report.section, None);
        assert_eq!(report.utilisation_percent, None);
        assert!(report.to_string().contains("NO COMPLIANT SECTION"));
    }

    #[test]
    fn test_report_json() {
        let input = CableSizingInput {
            load: LoadSpec::Current { amps: 10.0 },
            length_m: 10.0,
            ..CableSizingInput::default()
        };
        let json = serde_json::to_string(&sizing_report(&input)).unwrap();
        assert!(json.contains("\"status\":\"compliant\""));
    }

    #[test]
    fn test_voltage_drop_report() {
        let input = VoltageDropInput {
            label: "Lighting".to_string(),
            voltage_v: 230.0,
            phase: PhaseSystem::SinglePhase,
            current_a: 16.0,
            length_m: 50.0,
            material: Material::Copper,
            section_mm2: 2.5,
            power_factor: 0.9,
            parallel_runs: 1,
            max_voltage_drop_percent: Some(4.0),
        };
        let result = check_voltage_drop(&input, reference_database().unwrap()).unwrap();
        let report = VoltageDropReport::from_check(&input, &result);
        assert_eq!(report.section, "2.5 mm²");
        assert_eq!(report.passes, Some(false));
        assert!(!Report::passes(&report));
        assert!(report.to_string().ends_with("LIMIT EXCEEDED"));
    }
}
