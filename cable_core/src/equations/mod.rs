//! # Electrical Engineering Equations
//!
//! All formulas the sizing engine evaluates, kept in one place so they can be
//! checked against the standards independently of the search.
//!
//! ## Modules
//!
//! - [`electrical`] - Design current, voltage drop, derated ampacity
//!
//! ## Conventions
//!
//! - Power factor is lagging (inductive load), 0 < cosφ ≤ 1
//! - Lengths are one-way run lengths in metres
//! - Impedances are per conductor in Ω/km
//!
//! ## References
//!
//! - IEC 60364-5-52: Selection and erection of wiring systems
//! - CEI-UNEL 35023 / 35024: voltage drop and current-carrying capacity tables

pub mod electrical;

pub use electrical::{
    allowed_current,
    design_current,
    drop_coefficient,
    sin_phi,
    voltage_drop,
    VoltageDrop,
};
