//! # cable_core - Cable Sizing Selection Engine
//!
//! `cable_core` picks the smallest low- or medium-voltage cable that carries a
//! load within its derated ampacity and keeps the voltage drop under a limit.
//! All inputs and outputs are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Stateless**: the search is a pure function of a request and read-only tables
//! - **JSON-First**: all types implement Serialize/Deserialize
//! - **Explicit gaps**: a missing table entry is a `NotFound` value, never a zero
//!
//! ## Quick Start
//!
//! ```rust
//! use cable_core::calculations::{calculate, CableSizingInput, LoadSpec};
//! use cable_core::tables::reference_database;
//!
//! let input = CableSizingInput {
//!     label: "Kitchen ring".to_string(),
//!     load: LoadSpec::Current { amps: 16.0 },
//!     length_m: 50.0,
//!     ..CableSizingInput::default()
//! };
//!
//! let result = calculate(&input, reference_database().unwrap()).unwrap();
//! let selection = result.selection.unwrap();
//! println!("{} carries {:.1} A", selection.designation(), selection.allowed_current_a);
//! ```
//!
//! ## Modules
//!
//! - [`conductors`] - Material, insulation, method and phase enums
//! - [`tables`] - Ampacity/impedance lookup and the embedded reference database
//! - [`derating`] - k1..k4 correction factors
//! - [`equations`] - Design current and voltage-drop formulas
//! - [`calculations`] - Section search and voltage-drop check
//! - [`report`] - Display records for results
//! - [`archive`] - Saved calculations
//! - [`file_io`] - Archive files with atomic saves and locking
//! - [`pdf`] - PDF reports
//! - [`settings`] - TOML settings
//! - [`errors`] - Structured error types

pub mod archive;
pub mod calculations;
pub mod conductors;
pub mod derating;
pub mod equations;
pub mod errors;
#[cfg(not(target_arch = "wasm32"))]
pub mod file_io;
pub mod pdf;
pub mod report;
pub mod settings;
pub mod tables;

// Re-export commonly used types at crate root for convenience
pub use archive::{Archive, ArchiveEntry};
pub use calculations::{calculate, size_cable, CableSizingInput, CalculationItem, DesignRequest, SizingResult};
pub use errors::{CalcError, CalcResult};
#[cfg(not(target_arch = "wasm32"))]
pub use file_io::{load_archive, load_or_default, save_archive, FileLock};
pub use report::SizingReport;
pub use settings::Settings;
pub use tables::{reference_database, CableDatabase, CableTables};
