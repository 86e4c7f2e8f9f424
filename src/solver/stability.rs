//! Courant-type critical time-step estimate.

use serde::Serialize;

/// Critical time step from a characteristic element length and a material
/// wave speed. A diagnostic for unconditionally-stable implicit parameter
/// choices; an admissibility bound for the explicit/lumped configuration.
#[derive(Debug, Clone, Copy)]
pub struct StabilityEstimator {
    l_char: f64,
    wave_speed: f64,
}

/// Advisory only: the run proceeds, the caller is informed
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StabilityWarning {
    pub dt: f64,
    pub dt_crit: f64,
}

impl std::fmt::Display for StabilityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time step {:.6e} exceeds critical value {:.6e}",
            self.dt, self.dt_crit
        )
    }
}

impl StabilityEstimator {
    pub fn new(l_char: f64, wave_speed: f64) -> Self {
        assert!(l_char > 0. && wave_speed > 0.);
        StabilityEstimator { l_char, wave_speed }
    }

    /// 1-D bar estimate with wave speed sqrt(E / rho)
    pub fn from_material(l_char: f64, youngs_modulus: f64, density: f64) -> Self {
        Self::new(l_char, (youngs_modulus / density).sqrt())
    }

    pub fn critical_dt(&self) -> f64 {
        self.l_char / self.wave_speed
    }

    /// Compare a requested step against the critical value. Exceeding it is
    /// reported and logged but never fatal.
    pub fn check(&self, dt: f64) -> Option<StabilityWarning> {
        let dt_crit = self.critical_dt();
        if dt > dt_crit {
            let warning = StabilityWarning { dt, dt_crit };
            log::warn!("{}, stability is not guaranteed", warning);
            Some(warning)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_critical_dt_from_material() {
        // Steel bar, 1 m elements: c = sqrt(E/rho) ~ 5064 m/s
        let est = StabilityEstimator::from_material(1., 200e9, 7800.);
        assert_relative_eq!(est.critical_dt(), 1. / (200e9f64 / 7800.).sqrt());
    }

    #[test]
    fn test_check_boundary() {
        let est = StabilityEstimator::new(1., 100.);
        assert_relative_eq!(est.critical_dt(), 0.01);

        assert!(est.check(0.5 * 0.01).is_none());
        assert!(est.check(0.01).is_none());
        let warning = est.check(1.01 * 0.01).unwrap();
        assert_relative_eq!(warning.dt_crit, 0.01);
    }
}
