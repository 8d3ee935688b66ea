//! Heston path simulation.
//!
//! Variance follows a Milstein step on the square-root process, price follows
//! the exact log-normal step given the variance at the start of the step:
//!
//! ```text
//! v[t] = v + κ(θ − v)dt + ξ√v√dt·W_v + ¼ξ²dt(W_v² − 1)
//! S[t] = S[t−1]·exp((μ − ½v)dt + √(v·dt)·W_S)
//! ```
//!
//! with `v = max(v[t−1], VARIANCE_FLOOR)`, `W_S = Z1` and
//! `W_v = ρZ1 + √(1 − ρ²)Z2`.

use crate::error::SimulationError;
use configuration::SimulationParams;
use core_types::VolatilityParameters;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Lower bound applied to the variance process at every step.
pub const VARIANCE_FLOOR: f64 = 1e-4;

/// Record of a vol-of-vol reduction made to satisfy the Feller condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FellerAdjustment {
    pub original_xi: f64,
    pub adjusted_xi: f64,
}

/// Simulated prices and variances, both shaped `(steps + 1, paths)`.
///
/// Row 0 holds the starting state; column `j` is path `j`.
#[derive(Debug, Clone)]
pub struct SimulatedPathEnsemble {
    pub prices: Array2<f64>,
    pub variances: Array2<f64>,
    /// Step size in years.
    pub dt: f64,
    pub steps_per_day: usize,
    pub feller_adjustment: Option<FellerAdjustment>,
}

impl SimulatedPathEnsemble {
    pub fn steps(&self) -> usize {
        self.prices.nrows().saturating_sub(1)
    }

    pub fn paths(&self) -> usize {
        self.prices.ncols()
    }
}

#[derive(Debug, Clone)]
pub struct PathSimulator {
    params: SimulationParams,
}

impl PathSimulator {
    /// Creates a simulator after checking the matrix size against
    /// `max_matrix_cells` and validating the remaining settings.
    pub fn new(params: SimulationParams) -> Result<Self, SimulationError> {
        let cells = params.matrix_cells().unwrap_or(usize::MAX);
        if cells > params.max_matrix_cells {
            return Err(SimulationError::ResourceLimit { cells, limit: params.max_matrix_cells });
        }
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Simulates the configured number of paths from `spot`.
    ///
    /// The time loop is sequential; within a step every path is independent.
    /// With antithetic variates on, `⌈paths / 2⌉` shock pairs are drawn per step
    /// and the remaining columns reuse them negated.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        model: &VolatilityParameters,
        spot: f64,
        rng: &mut R,
    ) -> Result<SimulatedPathEnsemble, SimulationError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "spot must be positive and finite, got {}",
                spot
            )));
        }
        validate_model(model)?;

        let (xi, feller_adjustment) = feller_adjusted_xi(model);
        if let Some(adjustment) = feller_adjustment {
            tracing::warn!(
                kappa = model.kappa,
                theta = model.theta,
                original_xi = adjustment.original_xi,
                adjusted_xi = adjustment.adjusted_xi,
                "Feller condition violated, reducing vol of vol"
            );
        }

        let p = &self.params;
        let steps = p.steps();
        let paths = p.paths;
        let dt = p.dt();
        let sqrt_dt = dt.sqrt();
        let rho_complement = (1.0 - model.rho * model.rho).sqrt();
        let draws = if p.antithetic { paths.div_ceil(2) } else { paths };

        let mut prices = Array2::<f64>::zeros((steps + 1, paths));
        let mut variances = Array2::<f64>::zeros((steps + 1, paths));
        prices.row_mut(0).fill(spot);
        variances.row_mut(0).fill(model.v0.max(VARIANCE_FLOOR));

        let mut z1 = vec![0.0; paths];
        let mut z2 = vec![0.0; paths];

        for t in 1..=steps {
            for j in 0..draws {
                z1[j] = StandardNormal.sample(rng);
                z2[j] = StandardNormal.sample(rng);
            }
            for j in draws..paths {
                z1[j] = -z1[j - draws];
                z2[j] = -z2[j - draws];
            }

            for j in 0..paths {
                let w_s = z1[j];
                let w_v = model.rho * z1[j] + rho_complement * z2[j];

                let v = variances[[t - 1, j]].max(VARIANCE_FLOOR);
                let sqrt_v = v.sqrt();

                let next_v = v
                    + model.kappa * (model.theta - v) * dt
                    + xi * sqrt_v * sqrt_dt * w_v
                    + 0.25 * xi * xi * dt * (w_v * w_v - 1.0);
                variances[[t, j]] = next_v.max(VARIANCE_FLOOR);

                let drift = (model.mu - 0.5 * v) * dt;
                prices[[t, j]] = prices[[t - 1, j]] * (drift + sqrt_v * sqrt_dt * w_s).exp();
            }
        }

        if prices.row(steps).iter().any(|s| !s.is_finite()) {
            return Err(SimulationError::NonFinite("simulated prices".to_string()));
        }

        tracing::debug!(steps, paths, draws, "Simulated Heston paths");

        Ok(SimulatedPathEnsemble {
            prices,
            variances,
            dt,
            steps_per_day: p.steps_per_day,
            feller_adjustment,
        })
    }
}

fn validate_model(model: &VolatilityParameters) -> Result<(), SimulationError> {
    let fields = [
        ("v0", model.v0),
        ("theta", model.theta),
        ("kappa", model.kappa),
        ("xi", model.xi),
        ("rho", model.rho),
        ("mu", model.mu),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
        return Err(SimulationError::InvalidParameters(format!("{} must be finite", name)));
    }
    if model.v0 < 0.0 || model.theta < 0.0 || model.kappa < 0.0 || model.xi < 0.0 {
        return Err(SimulationError::InvalidParameters(
            "v0, theta, kappa and xi must be non-negative".to_string(),
        ));
    }
    if !(-1.0..=1.0).contains(&model.rho) {
        return Err(SimulationError::InvalidParameters(format!(
            "rho must lie in [-1, 1], got {}",
            model.rho
        )));
    }
    Ok(())
}

/// The vol of vol to simulate with: unchanged when `2κθ > ξ²`, otherwise
/// `0.9·√(2κθ)`.
fn feller_adjusted_xi(model: &VolatilityParameters) -> (f64, Option<FellerAdjustment>) {
    if model.satisfies_feller() {
        return (model.xi, None);
    }
    let adjusted_xi = 0.9 * (2.0 * model.kappa * model.theta).sqrt();
    (adjusted_xi, Some(FellerAdjustment { original_xi: model.xi, adjusted_xi }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model() -> VolatilityParameters {
        VolatilityParameters {
            v0: 0.04,
            theta: 0.04,
            kappa: 2.0,
            xi: 0.3,
            rho: -0.3,
            mu: 0.05,
            spot: 100.0,
        }
    }

    fn small_params(paths: usize, antithetic: bool) -> SimulationParams {
        SimulationParams {
            horizon_days: 5,
            steps_per_day: 2,
            paths,
            antithetic,
            seed: None,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn ensemble_has_expected_shape_and_start() {
        let simulator = PathSimulator::new(small_params(7, true)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let ensemble = simulator.simulate(&model(), 100.0, &mut rng).unwrap();

        assert_eq!(ensemble.prices.dim(), (11, 7));
        assert_eq!(ensemble.variances.dim(), (11, 7));
        assert_eq!(ensemble.steps(), 10);
        assert_eq!(ensemble.paths(), 7);
        assert!(ensemble.prices.row(0).iter().all(|s| *s == 100.0));
        assert!(ensemble.feller_adjustment.is_none());
    }

    #[test]
    fn single_step_matches_the_milstein_and_log_price_updates() {
        let model = VolatilityParameters { xi: 0.5, rho: -0.6, kappa: 3.0, theta: 0.09, ..model() };
        let params = SimulationParams {
            horizon_days: 1,
            steps_per_day: 1,
            paths: 1,
            antithetic: false,
            ..SimulationParams::default()
        };
        let simulator = PathSimulator::new(params.clone()).unwrap();
        let ensemble = simulator.simulate(&model, 100.0, &mut StdRng::seed_from_u64(21)).unwrap();
        assert!(ensemble.feller_adjustment.is_none());

        // Replay the two shocks the simulator drew for this step.
        let mut replay = StdRng::seed_from_u64(21);
        let z1: f64 = StandardNormal.sample(&mut replay);
        let z2: f64 = StandardNormal.sample(&mut replay);
        let w_s = z1;
        let w_v = model.rho * z1 + (1.0 - model.rho * model.rho).sqrt() * z2;

        let dt = params.dt();
        let v = model.v0;
        let euler = v + model.kappa * (model.theta - v) * dt + model.xi * v.sqrt() * dt.sqrt() * w_v;
        let milstein = euler + 0.25 * model.xi * model.xi * dt * (w_v * w_v - 1.0);
        let price = 100.0 * ((model.mu - 0.5 * v) * dt + (v * dt).sqrt() * w_s).exp();

        assert!((ensemble.variances[[1, 0]] - milstein.max(VARIANCE_FLOOR)).abs() < 1e-15);
        assert!((ensemble.prices[[1, 0]] - price).abs() < 1e-10);
        // The correction term is visible, so a plain Euler step would not match.
        assert!((ensemble.variances[[1, 0]] - euler).abs() > 1e-9);
    }

    #[test]
    fn variance_never_drops_below_floor() {
        let extreme = VolatilityParameters { v0: 0.0, theta: 0.0001, kappa: 0.1, xi: 2.0, ..model() };
        let simulator = PathSimulator::new(small_params(200, false)).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let ensemble = simulator.simulate(&extreme, 50.0, &mut rng).unwrap();
        assert!(ensemble.variances.iter().all(|v| *v >= VARIANCE_FLOOR));
        assert!(ensemble.prices.iter().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn feller_violation_reduces_xi() {
        let violating = VolatilityParameters { kappa: 0.5, theta: 0.02, xi: 1.0, ..model() };
        let (xi, adjustment) = feller_adjusted_xi(&violating);
        let expected = 0.9 * (2.0f64 * 0.5 * 0.02).sqrt();
        assert!((xi - expected).abs() < 1e-12);
        assert_eq!(adjustment, Some(FellerAdjustment { original_xi: 1.0, adjusted_xi: xi }));
        assert!(2.0 * violating.kappa * violating.theta > xi * xi);

        let simulator = PathSimulator::new(small_params(4, true)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let ensemble = simulator.simulate(&violating, 100.0, &mut rng).unwrap();
        assert_eq!(ensemble.feller_adjustment, adjustment);
    }

    #[test]
    fn antithetic_columns_mirror_their_partners() {
        // With xi = 0 and v0 = theta the variance path is deterministic, so the
        // mirrored log returns are exact negatives of each other.
        let flat = VolatilityParameters { xi: 0.0, rho: 0.0, mu: 0.0, ..model() };
        let params = SimulationParams { horizon_days: 1, steps_per_day: 1, ..small_params(5, true) };
        let simulator = PathSimulator::new(params).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let ensemble = simulator.simulate(&flat, 100.0, &mut rng).unwrap();

        let drift = -0.5 * 0.04 * ensemble.dt;
        let log_move = |j: usize| (ensemble.prices[[1, j]] / 100.0).ln() - drift;
        // Three independent draws fill columns 0..3; columns 3 and 4 mirror 0 and 1.
        assert!((log_move(3) + log_move(0)).abs() < 1e-12);
        assert!((log_move(4) + log_move(1)).abs() < 1e-12);
        assert!((log_move(2) + log_move(0)).abs() > 1e-12);
    }

    #[test]
    fn rejects_oversized_matrix() {
        let params = SimulationParams {
            paths: 1_000,
            horizon_days: 1_000,
            max_matrix_cells: 10_000,
            ..SimulationParams::default()
        };
        assert!(matches!(
            PathSimulator::new(params),
            Err(SimulationError::ResourceLimit { limit: 10_000, .. })
        ));

        let overflowing = SimulationParams { horizon_days: usize::MAX / 2, ..SimulationParams::default() };
        assert!(matches!(
            PathSimulator::new(overflowing),
            Err(SimulationError::ResourceLimit { cells: usize::MAX, .. })
        ));
    }

    #[test]
    fn rejects_bad_spot_and_model() {
        let simulator = PathSimulator::new(small_params(4, true)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            simulator.simulate(&model(), 0.0, &mut rng),
            Err(SimulationError::InvalidInput(_))
        ));
        assert!(matches!(
            simulator.simulate(&model(), f64::NAN, &mut rng),
            Err(SimulationError::InvalidInput(_))
        ));
        let bad_rho = VolatilityParameters { rho: -1.5, ..model() };
        assert!(matches!(
            simulator.simulate(&bad_rho, 100.0, &mut rng),
            Err(SimulationError::InvalidParameters(_))
        ));
    }

    #[test]
    fn zero_paths_is_rejected() {
        assert!(matches!(
            PathSimulator::new(small_params(0, true)),
            Err(SimulationError::InvalidParameters(_))
        ));
    }
}
