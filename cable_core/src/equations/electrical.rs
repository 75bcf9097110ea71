//! # Electrical Formulas
//!
//! Design current and voltage drop for single-phase and balanced three-phase
//! circuits.
//!
//! ## Notation
//!
//! - `P` = Active power (kW)
//! - `V` = Nominal voltage (V), phase-to-neutral for single-phase,
//!   phase-to-phase for three-phase
//! - `Ib` = Design current (A)
//! - `L` = One-way run length (m)
//! - `R`, `X` = Conductor resistance and reactance (Ω/km)
//! - `cosφ` = Power factor, lagging
//! - `k` = 2 for single-phase (go and return), √3 for three-phase
//!
//! ## References
//!
//! - IEC 60364-5-52 Annex G (voltage drop)
//! - CEI 64-8 art. 525

use serde::{Deserialize, Serialize};

use crate::conductors::PhaseSystem;

/// Voltage drop along a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageDrop {
    /// Drop in volts
    pub volts: f64,
    /// Drop as percent of nominal voltage
    pub percent: f64,
}

/// Drop coefficient k: 2 for single-phase, √3 for three-phase
#[inline]
pub fn drop_coefficient(phase: PhaseSystem) -> f64 {
    match phase {
        PhaseSystem::SinglePhase => 2.0,
        PhaseSystem::ThreePhase => 3f64.sqrt(),
    }
}

/// sinφ for a lagging power factor.
///
/// `cosφ` must lie in (0, 1]; above 1 the result is NaN. Inputs are
/// validated before they get here.
#[inline]
pub fn sin_phi(cos_phi: f64) -> f64 {
    (1.0 - cos_phi * cos_phi).sqrt()
}

/// Design current from active power.
///
/// # Formulas
/// - Single-phase: Ib = P·1000 / (V·cosφ)
/// - Three-phase:  Ib = P·1000 / (√3·V·cosφ)
///
/// Zero (or NaN) power means "no load" and gives 0 A, not an error.
pub fn design_current(power_kw: f64, voltage_v: f64, cos_phi: f64, phase: PhaseSystem) -> f64 {
    if power_kw == 0.0 || power_kw.is_nan() {
        return 0.0;
    }
    let power_w = power_kw * 1000.0;
    match phase {
        PhaseSystem::SinglePhase => power_w / (voltage_v * cos_phi),
        PhaseSystem::ThreePhase => power_w / (3f64.sqrt() * voltage_v * cos_phi),
    }
}

/// Voltage drop along a run.
///
/// # Formula
/// ```text
/// ΔV  = k · L · Ib · (R·cosφ + X·sinφ) · 10⁻³
/// ΔV% = ΔV / V · 100
/// ```
///
/// `r_ohm_km` and `x_ohm_km` are the values of the whole phase: with N
/// conductors in parallel, divide the tabulated values by N first.
pub fn voltage_drop(
    voltage_v: f64,
    current_a: f64,
    length_m: f64,
    r_ohm_km: f64,
    x_ohm_km: f64,
    cos_phi: f64,
    phase: PhaseSystem,
) -> VoltageDrop {
    let k = drop_coefficient(phase);
    let volts = k * length_m * current_a * (r_ohm_km * cos_phi + x_ohm_km * sin_phi(cos_phi)) * 1e-3;
    VoltageDrop {
        volts,
        percent: volts / voltage_v * 100.0,
    }
}

/// Permissible current of N parallel conductors: Iz = I0 · Ktot · N
#[inline]
pub fn allowed_current(base_ampacity_a: f64, k_total: f64, parallel_runs: u32) -> f64 {
    base_ampacity_a * k_total * f64::from(parallel_runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn test_single_phase_design_current() {
        // 3 kW at 230 V, cosφ 0.9 → 14.49 A
        let ib = design_current(3.0, 230.0, 0.9, PhaseSystem::SinglePhase);
        assert!(approx_eq(ib, 3000.0 / 207.0), "Ib = {}", ib);
    }

    #[test]
    fn test_three_phase_design_current() {
        // 10 kW at 400 V, cosφ 0.9 → 16.04 A
        let ib = design_current(10.0, 400.0, 0.9, PhaseSystem::ThreePhase);
        assert!((ib - 16.0375).abs() < 1e-3, "Ib = {}", ib);
    }

    #[test]
    fn test_zero_power_is_no_load() {
        assert_eq!(design_current(0.0, 230.0, 0.9, PhaseSystem::SinglePhase), 0.0);
        assert_eq!(design_current(f64::NAN, 230.0, 0.9, PhaseSystem::ThreePhase), 0.0);
    }

    #[test]
    fn test_voltage_drop_single_phase() {
        // 16 A over 50 m of 4 mm² copper (R 5.57, X 0.101), cosφ 0.9
        let dv = voltage_drop(230.0, 16.0, 50.0, 5.57, 0.101, 0.9, PhaseSystem::SinglePhase);
        let expected = 2.0 * 50.0 * 16.0 * (5.57 * 0.9 + 0.101 * sin_phi(0.9)) * 1e-3;
        assert!(approx_eq(dv.volts, expected));
        assert!((dv.percent - 3.518).abs() < 1e-3, "ΔV% = {}", dv.percent);
    }

    #[test]
    fn test_unity_power_factor_ignores_reactance() {
        let a = voltage_drop(400.0, 32.0, 80.0, 1.41, 0.0, 1.0, PhaseSystem::ThreePhase);
        let b = voltage_drop(400.0, 32.0, 80.0, 1.41, 5.0, 1.0, PhaseSystem::ThreePhase);
        assert!((a.volts - b.volts).abs() < EPSILON);
    }

    #[test]
    fn test_power_factor_above_one_is_nan() {
        assert!(sin_phi(1.1).is_nan());
    }

    #[test]
    fn test_allowed_current() {
        assert!(approx_eq(allowed_current(399.0, 0.8, 2), 638.4));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Design current is proportional to power.
        #[test]
        fn prop_design_current_proportional_to_power(
            p in 0.1f64..500.0,
            v in 100.0f64..1000.0,
            cos in 0.5f64..=1.0,
        ) {
            let single = design_current(p, v, cos, PhaseSystem::SinglePhase);
            let doubled = design_current(2.0 * p, v, cos, PhaseSystem::SinglePhase);
            prop_assert!(approx_eq(doubled, 2.0 * single));
        }

        /// Three-phase current is the single-phase current over √3.
        #[test]
        fn prop_three_phase_is_single_over_sqrt3(
            p in 0.1f64..500.0,
            v in 100.0f64..1000.0,
            cos in 0.5f64..=1.0,
        ) {
            let single = design_current(p, v, cos, PhaseSystem::SinglePhase);
            let three = design_current(p, v, cos, PhaseSystem::ThreePhase);
            prop_assert!(approx_eq(three, single / 3f64.sqrt()));
        }

        /// Doubling the length doubles the drop.
        #[test]
        fn prop_drop_scales_with_length(
            ib in 1.0f64..500.0,
            l in 1.0f64..1000.0,
            r in 0.05f64..20.0,
            x in 0.0f64..0.2,
            cos in 0.5f64..=1.0,
        ) {
            let one = voltage_drop(400.0, ib, l, r, x, cos, PhaseSystem::ThreePhase);
            let two = voltage_drop(400.0, ib, 2.0 * l, r, x, cos, PhaseSystem::ThreePhase);
            prop_assert!(approx_eq(two.volts, 2.0 * one.volts));
            prop_assert!(approx_eq(two.percent, 2.0 * one.percent));
        }
    }
}
