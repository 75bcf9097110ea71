//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cable_core::archive::Archive;
use cable_core::calculations::{
    calculate, check_voltage_drop, CableSizingInput, CalculationItem, CalculationOutcome, LoadSpec, VoltageDropInput,
};
use cable_core::conductors::{
    format_section, CableConstruction, InstallationMethod, InsulationClass, Material, PhaseSystem, TensionCategory,
};
use cable_core::derating::{DeratingFactors, DeratingSource};
use cable_core::file_io::{load_or_default, save_archive, FileLock};
use cable_core::pdf::render_entry_pdf;
use cable_core::report::{SizingReport, VoltageDropReport};
use cable_core::settings::Settings;
use cable_core::tables::{AmpacityScope, CableTables};
use clap::{Args, Subcommand};
use tracing::info;

fn parse_phase(s: &str) -> Result<PhaseSystem, String> {
    PhaseSystem::from_str_flexible(s).map_err(|e| e.to_string())
}

fn parse_material(s: &str) -> Result<Material, String> {
    Material::from_str_flexible(s).map_err(|e| e.to_string())
}

fn parse_insulation(s: &str) -> Result<InsulationClass, String> {
    InsulationClass::from_str_flexible(s).map_err(|e| e.to_string())
}

fn parse_tension(s: &str) -> Result<TensionCategory, String> {
    TensionCategory::from_str_flexible(s).map_err(|e| e.to_string())
}

fn parse_method(s: &str) -> Result<InstallationMethod, String> {
    InstallationMethod::from_str_flexible(s).map_err(|e| e.to_string())
}

/// Cable type flags shared by several commands
#[derive(Args, Debug)]
pub struct CableTypeArgs {
    /// Single-phase or three-phase
    #[arg(long, value_parser = parse_phase)]
    phase: Option<PhaseSystem>,

    /// Conductor material (copper, aluminium)
    #[arg(long, value_parser = parse_material)]
    material: Option<Material>,

    /// Insulation (PVC, EPR)
    #[arg(long, value_parser = parse_insulation)]
    insulation: Option<InsulationClass>,

    /// Tension category (LV, MV)
    #[arg(long, value_parser = parse_tension)]
    tension: Option<TensionCategory>,

    /// Installation method (A1, B1, C, E, D1, ...)
    #[arg(long, value_parser = parse_method)]
    method: Option<InstallationMethod>,
}

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Circuit label
    #[arg(long, default_value = "")]
    label: String,

    /// Design current (A)
    #[arg(long, conflicts_with = "power", required_unless_present = "power")]
    current: Option<f64>,

    /// Active power (kW)
    #[arg(long)]
    power: Option<f64>,

    /// One-way length (m)
    #[arg(long)]
    length: f64,

    /// Nominal voltage (V)
    #[arg(long)]
    voltage: Option<f64>,

    /// Power factor cosφ
    #[arg(long)]
    cos_phi: Option<f64>,

    /// Maximum voltage drop (%)
    #[arg(long)]
    max_drop: Option<f64>,

    #[command(flatten)]
    cable: CableTypeArgs,

    /// Ambient temperature (°C)
    #[arg(long)]
    ambient: Option<f64>,

    /// Circuits laid together
    #[arg(long)]
    grouping: Option<u32>,

    /// Laying depth (m), buried methods
    #[arg(long)]
    depth: Option<f64>,

    /// Soil thermal resistivity (K·m/W), buried methods
    #[arg(long)]
    soil: Option<f64>,

    /// Use these k1,k2,k3,k4 instead of the correction tables
    #[arg(long, value_delimiter = ',')]
    factors: Option<Vec<f64>>,

    /// Conductors per phase to start from
    #[arg(long)]
    runs: Option<u32>,

    /// Add parallel runs when one is not enough
    #[arg(long)]
    auto_parallel: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Save the calculation in the archive under this name
    #[arg(long)]
    save: Option<String>,
}

#[derive(Args, Debug)]
pub struct DropArgs {
    /// Circuit label
    #[arg(long, default_value = "")]
    label: String,

    /// Load current (A)
    #[arg(long)]
    current: f64,

    /// One-way length (m)
    #[arg(long)]
    length: f64,

    /// Cross-section (mm²)
    #[arg(long)]
    section: f64,

    /// Nominal voltage (V)
    #[arg(long)]
    voltage: Option<f64>,

    /// Single-phase or three-phase
    #[arg(long, value_parser = parse_phase)]
    phase: Option<PhaseSystem>,

    /// Conductor material
    #[arg(long, value_parser = parse_material)]
    material: Option<Material>,

    /// Power factor cosφ
    #[arg(long)]
    cos_phi: Option<f64>,

    /// Conductors per phase
    #[arg(long, default_value_t = 1)]
    runs: u32,

    /// Limit to compare against (%)
    #[arg(long)]
    max_drop: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Save the check in the archive under this name
    #[arg(long)]
    save: Option<String>,
}

#[derive(Args, Debug)]
pub struct SectionsArgs {
    #[command(flatten)]
    cable: CableTypeArgs,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// List saved calculations, newest first
    #[command(alias = "ls")]
    List,

    /// Delete one entry
    Delete {
        /// Entry id or unique id prefix
        id: String,
    },

    /// Delete every entry
    Clear,

    /// Render the PDF report of an entry
    Report {
        /// Entry id or unique id prefix
        id: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// `size`
pub fn size(settings: &Settings, args: &SizeArgs) -> Result<()> {
    let input = sizing_input(settings, args)?;
    let db = settings.database().context("failed to load lookup database")?;

    let request = input.design_request().context("invalid sizing parameters")?;
    let result = calculate(&input, db.as_ref()).context("sizing failed")?;
    let report = SizingReport::from_calculation(&input, &request, &result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if let Some(name) = &args.save {
        store(settings, name, CalculationItem::CableSizing(input), CalculationOutcome::CableSizing(result))?;
    }
    Ok(())
}

fn sizing_input(settings: &Settings, args: &SizeArgs) -> Result<CableSizingInput> {
    let mut input = settings.sizing_template();
    input.label = args.label.clone();
    input.load = match (args.current, args.power) {
        (Some(amps), _) => LoadSpec::Current { amps },
        (None, Some(kw)) => LoadSpec::Power { kw },
        (None, None) => LoadSpec::default(),
    };
    input.length_m = args.length;
    if let Some(v) = args.voltage {
        input.voltage_v = v;
    }
    if let Some(cos) = args.cos_phi {
        input.power_factor = cos;
    }
    if let Some(dv) = args.max_drop {
        input.max_voltage_drop_percent = dv;
    }
    let cable = &args.cable;
    input.phase = cable.phase.unwrap_or(input.phase);
    input.material = cable.material.unwrap_or(input.material);
    input.insulation = cable.insulation.unwrap_or(input.insulation);
    input.tension = cable.tension.unwrap_or(input.tension);
    input.installation_method = cable.method.unwrap_or(input.installation_method);

    input.derating = match args.factors.as_deref() {
        Some(&[k1, k2, k3, k4]) => DeratingSource::Fixed(DeratingFactors::new(k1, k2, k3, k4)),
        Some(other) => bail!("--factors takes exactly four values k1,k2,k3,k4, got {}", other.len()),
        None => {
            // Site conditions follow the environment of the chosen method
            let mut conditions = settings
                .site
                .derating_conditions(input.installation_method.environment());
            if args.ambient.is_some() {
                conditions.ambient_temperature_c = args.ambient;
            }
            if let Some(n) = args.grouping {
                conditions.grouping_count = n;
            }
            if input.installation_method.is_buried() {
                conditions.burial_depth_m = args.depth.or(conditions.burial_depth_m);
                conditions.soil_resistivity_km_w = args.soil.or(conditions.soil_resistivity_km_w);
            }
            DeratingSource::Conditions(conditions)
        }
    };

    if let Some(runs) = args.runs {
        input.base_parallel_runs = runs;
    }
    input.allow_auto_parallel = input.allow_auto_parallel || args.auto_parallel;
    Ok(input)
}

/// `drop`
pub fn voltage_drop(settings: &Settings, args: &DropArgs) -> Result<()> {
    let d = &settings.defaults;
    let input = VoltageDropInput {
        label: args.label.clone(),
        voltage_v: args.voltage.unwrap_or(d.voltage_v),
        phase: args.phase.unwrap_or(d.phase),
        current_a: args.current,
        length_m: args.length,
        material: args.material.unwrap_or(d.material),
        section_mm2: args.section,
        power_factor: args.cos_phi.unwrap_or(d.power_factor),
        parallel_runs: args.runs,
        max_voltage_drop_percent: args.max_drop.or(Some(d.max_voltage_drop_percent)),
    };
    let db = settings.database().context("failed to load lookup database")?;
    let result = check_voltage_drop(&input, db.as_ref()).context("voltage drop check failed")?;
    let report = VoltageDropReport::from_check(&input, &result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if let Some(name) = &args.save {
        store(settings, name, CalculationItem::VoltageDrop(input), CalculationOutcome::VoltageDrop(result))?;
    }
    Ok(())
}

/// `sections`
pub fn sections(settings: &Settings, args: &SectionsArgs) -> Result<()> {
    let d = &settings.defaults;
    let cable = &args.cable;
    let phase = cable.phase.unwrap_or(d.phase);
    let scope = AmpacityScope {
        tension: cable.tension.unwrap_or(d.tension),
        insulation: cable.insulation.unwrap_or(d.insulation),
        material: cable.material.unwrap_or(d.material),
        method: cable.method.unwrap_or(d.installation_method),
        arrangement: phase.arrangement(),
    };
    let db = settings.database().context("failed to load lookup database")?;
    let db = db.as_ref();
    if !db.has_ampacity_scope(&scope) {
        bail!("no table for {}", scope);
    }

    println!("{}", scope);
    println!("{:>8}  {:>8}  {:>9}  {:>9}", "mm²", "I0 (A)", "R (Ω/km)", "X (Ω/km)");
    let min = scope.material.min_section_mm2();
    for section in db.cross_sections(&scope) {
        let i0 = db.ampacity(&scope, section).ok();
        let z = db
            .impedance_table(scope.material, CableConstruction::Multicore)
            .and_then(|t| t.get(section).copied());
        let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        let note = if min.is_some_and(|m| section < m) { "  (below minimum)" } else { "" };
        println!(
            "{:>8}  {:>8}  {:>9}  {:>9}{}",
            format_section(section),
            cell(i0),
            cell(z.map(|z| z.r_ohm_km)),
            cell(z.map(|z| z.x_ohm_km)),
            note
        );
    }
    Ok(())
}

/// `archive ...`
pub fn archive(settings: &Settings, cmd: &ArchiveCommands) -> Result<()> {
    let path = &settings.files.archive;
    match cmd {
        ArchiveCommands::List => {
            let archive = load_or_default(path).with_context(|| format!("failed to read {}", path.display()))?;
            if archive.is_empty() {
                println!("archive is empty");
            }
            for entry in &archive.entries {
                println!(
                    "{}  {}  {:<14}  {:<24}  {}",
                    &entry.id.to_string()[..8],
                    entry.saved_at.format("%Y-%m-%d %H:%M"),
                    entry.item.calc_type(),
                    entry.name,
                    entry.outcome.summary()
                );
            }
            Ok(())
        }
        ArchiveCommands::Delete { id } => modify_archive(settings, |archive| {
            let entry_id = archive
                .find(id)
                .map(|e| e.id)
                .with_context(|| format!("no archive entry matches '{}'", id))?;
            archive.remove(&entry_id);
            println!("deleted {}", entry_id);
            Ok(())
        }),
        ArchiveCommands::Clear => modify_archive(settings, |archive| {
            let count = archive.len();
            archive.clear();
            println!("deleted {} entries", count);
            Ok(())
        }),
        ArchiveCommands::Report { id, out } => {
            let archive = load_or_default(path).with_context(|| format!("failed to read {}", path.display()))?;
            let entry = archive
                .find(id)
                .with_context(|| format!("no archive entry matches '{}'", id))?;
            let pdf = render_entry_pdf(entry).context("failed to render report")?;
            std::fs::write(out, pdf).with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("wrote {}", out.display());
            Ok(())
        }
    }
}

fn store(settings: &Settings, name: &str, item: CalculationItem, outcome: CalculationOutcome) -> Result<()> {
    modify_archive(settings, |archive| {
        let id = archive.save(name, item, outcome);
        println!("saved as {}", id);
        Ok(())
    })
}

/// Lock, load, change and atomically save the archive
fn modify_archive(settings: &Settings, change: impl FnOnce(&mut Archive) -> Result<()>) -> Result<()> {
    let path = &settings.files.archive;
    let user = settings
        .files
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .unwrap_or_else(|| "cablesizer".to_string());

    let _lock = FileLock::acquire(path, user).with_context(|| format!("failed to lock {}", path.display()))?;
    let mut archive = load_or_default(path).with_context(|| format!("failed to read {}", path.display()))?;
    change(&mut archive)?;
    save_archive(&archive, path).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
