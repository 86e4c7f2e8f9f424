#![allow(non_snake_case)]

use approx::abs_diff_eq;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::operator::{BoundaryConditionSet, Operator};
use crate::output::{Snapshot, SnapshotWriter, TimeSeries};
use crate::prelude::*;

pub mod effective;
pub mod energy;
pub mod stability;

use effective::{EffectiveSystem, EffectiveSystemBuilder};
use energy::EnergyAccountant;
use stability::{StabilityEstimator, StabilityWarning};

/// Absolute tolerance for the explicit-equivalence check on (beta, gamma).
/// Absolute because the expected beta is exactly 0, where a relative
/// tolerance is undefined.
pub const LUMPED_TOL: f64 = 1e-12;

//------------------------------------------------------------------------------
// Step configuration
//------------------------------------------------------------------------------

/// Newmark step parameters, fixed for the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub beta: f64,
    pub gamma: f64,
    pub h: f64, // time step (sec)
    pub num_steps: usize,
    pub use_lumped_mass: bool,
}

impl StepConfig {
    pub fn new(beta: f64, gamma: f64, h: f64, num_steps: usize) -> Self {
        StepConfig {
            beta,
            gamma,
            h,
            num_steps,
            use_lumped_mass: false,
        }
    }

    /// Average acceleration (unconditionally stable, second order)
    pub fn average_acceleration(h: f64, num_steps: usize) -> Self {
        Self::new(0.25, 0.5, h, num_steps)
    }

    /// Linear acceleration (conditionally stable)
    pub fn linear_acceleration(h: f64, num_steps: usize) -> Self {
        Self::new(1. / 6., 0.5, h, num_steps)
    }

    /// Central difference via the lumped diagonal mass (fully explicit)
    pub fn central_difference(h: f64, num_steps: usize) -> Self {
        Self::new(0., 0.5, h, num_steps).with_lumped_mass()
    }

    pub fn with_lumped_mass(mut self) -> Self {
        self.use_lumped_mass = true;
        self
    }

    pub fn validate(&self) -> SolverResult<()> {
        if !(self.h > 0.) {
            return Err(SolverError::Configuration(format!(
                "time step must be positive (got {})",
                self.h
            )));
        }
        if self.beta < 0. || self.gamma < 0. {
            return Err(SolverError::Configuration(format!(
                "beta and gamma must be non-negative (got beta = {}, gamma = {})",
                self.beta, self.gamma
            )));
        }
        if self.use_lumped_mass
            && !(abs_diff_eq!(self.beta, 0., epsilon = LUMPED_TOL)
                && abs_diff_eq!(self.gamma, 0.5, epsilon = LUMPED_TOL))
        {
            return Err(SolverError::Configuration(format!(
                "lumped mass requires beta = 0, gamma = 1/2 (got beta = {}, gamma = {})",
                self.beta, self.gamma
            )));
        }
        Ok(())
    }
}

//------------------------------------------------------------------------------
// External force
//------------------------------------------------------------------------------

/// External load as a pure function of time, evaluated once per step at
/// t = (n+1)h
pub trait ForceEvaluator {
    fn force(&self, t: f64) -> VectorD;
}

impl<F> ForceEvaluator for F
where
    F: Fn(f64) -> VectorD,
{
    fn force(&self, t: f64) -> VectorD {
        self(t)
    }
}

//------------------------------------------------------------------------------
// State
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct State {
    pub t: f64,     // time
    pub u: VectorD, // displacement
    pub v: VectorD, // velocity
    pub a: VectorD, // acceleration
}

impl State {
    pub fn new(ndofs: usize, t0: f64) -> Self {
        State {
            t: t0,
            u: VectorD::zeros(ndofs),
            v: VectorD::zeros(ndofs),
            a: VectorD::zeros(ndofs),
        }
    }

    pub fn new_with_initial_state(t0: f64, u0: &VectorD, v0: &VectorD) -> Self {
        assert_eq!(u0.len(), v0.len());
        State {
            t: t0,
            u: u0.clone(),
            v: v0.clone(),
            a: VectorD::zeros(u0.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Stepping,
    Completed,
}

//------------------------------------------------------------------------------
// Integrator
//------------------------------------------------------------------------------

/// Implicit Newmark-beta time integrator. Owns the (u, v, a) state triple
/// exclusively and mutates it once per step; the effective system is built
/// and factorized once at construction and reused for every solve.
///
/// The machine is linear: Initialized -> Stepping -> Completed, terminal
/// after `num_steps` steps. It is not restartable; build a new integrator to
/// rerun.
pub struct NewmarkIntegrator {
    pub state: State,
    config: StepConfig,
    M: Operator,
    C: Operator,
    K: Operator,
    bcs: BoundaryConditionSet,
    system: EffectiveSystem,
    energy: EnergyAccountant,
    series: TimeSeries,
    warning: Option<StabilityWarning>,
    phase: Phase,
    step_num: usize,
    tip_dof: usize,
}

impl NewmarkIntegrator {
    /// Bake the boundary conditions into the operators, build and factorize
    /// the effective system, and seed the state. In explicit/lumped mode a
    /// supplied stability estimate is checked against the requested step;
    /// an exceeded bound is recorded as a warning, never an error.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        M: Operator,
        C: Operator,
        K: Operator,
        bcs: BoundaryConditionSet,
        config: &StepConfig,
        state0: &State,
        stability: Option<&StabilityEstimator>,
        tip_dof: usize,
    ) -> SolverResult<Self> {
        config.validate()?;

        let ndofs = M.dim();
        assert_eq!(C.dim(), ndofs, "operator dimensions must match");
        assert_eq!(K.dim(), ndofs, "operator dimensions must match");
        assert_eq!(state0.u.len(), ndofs, "state dimension must match");
        assert!(tip_dof < ndofs, "monitored dof out of range");

        // Constrained rows become identity rows in every operator entering
        // the effective system
        let mut M = M;
        let mut C = C;
        let mut K = K;
        bcs.apply_to_matrix(&mut M);
        bcs.apply_to_matrix(&mut C);
        bcs.apply_to_matrix(&mut K);

        let system = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, config).build()?;

        let warning = match stability {
            Some(est) if config.use_lumped_mass => est.check(config.h),
            _ => None,
        };

        // Constrained dofs start at their prescribed values and never move
        let mut state = state0.clone();
        bcs.apply_to_vector(&mut state.u);
        for &(dof, _) in bcs.iter() {
            state.v[dof] = 0.;
            state.a[dof] = 0.;
        }

        Ok(NewmarkIntegrator {
            state,
            config: config.clone(),
            M,
            C,
            K,
            bcs,
            system,
            energy: EnergyAccountant::new(),
            series: TimeSeries::new(),
            warning,
            phase: Phase::Initialized,
            step_num: 0,
            tip_dof,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn stability_warning(&self) -> Option<&StabilityWarning> {
        self.warning.as_ref()
    }

    /// Complete the initial acceleration from the initial conditions:
    /// a0 = M^-1 (f(t0) - C v0 - K u0)
    fn initial_acceleration<F: ForceEvaluator>(&self, force: &F) -> SolverResult<VectorD> {
        let mut f = force.force(self.state.t);
        debug_assert_eq!(f.len(), self.M.dim());
        f -= self.C.apply(&self.state.v);
        f -= self.K.apply(&self.state.u);
        self.bcs.apply_to_vector(&mut f);

        if self.config.use_lumped_mass {
            // The eliminated mass has unit constrained rows, so its row-sum
            // diagonal stays valid
            let m = self.M.lumped();
            if m.min() <= 0. {
                return Err(SolverError::SingularSystem);
            }
            Ok(f.component_div(&m))
        } else {
            Ok(self.M.factorize()?.solve(&f))
        }
    }

    /// Advance one step. A no-op once the run is complete; the caller may
    /// stop between completed steps (a step itself is atomic).
    pub fn step<F, W>(&mut self, force: &F, writer: &mut W) -> SolverResult<()>
    where
        F: ForceEvaluator,
        W: SnapshotWriter,
    {
        if self.step_num >= self.config.num_steps {
            self.phase = Phase::Completed;
            return Ok(());
        }
        if self.phase == Phase::Initialized {
            self.state.a = self.initial_acceleration(force)?;
            self.phase = Phase::Stepping;
        }

        let StepConfig { beta, gamma, h, .. } = self.config;
        let t = self.state.t + h;

        // Predictor, from the previous acceleration only
        let u_tilde = &self.state.u + h * &self.state.v + (0.5 - beta) * h * h * &self.state.a;
        let v_tilde = &self.state.v + (1. - gamma) * h * &self.state.a;

        // Effective load at t = (n+1)h
        let mut f = force.force(t);
        debug_assert_eq!(f.len(), self.M.dim());
        f -= self.C.apply(&v_tilde);
        f -= self.K.apply(&u_tilde);
        self.bcs.apply_to_vector(&mut f);

        // Solve for the new acceleration
        let a = self.system.solve(&f);

        // Corrector
        let u = u_tilde + beta * h * h * &a;
        let v = v_tilde + gamma * h * &a;

        self.state = State { t, u, v, a };
        self.step_num += 1;
        if self.step_num == self.config.num_steps {
            self.phase = Phase::Completed;
        }

        let row = self
            .energy
            .account(&self.state, &self.M, &self.C, &self.K, h);
        self.series.append(t, self.state.u[self.tip_dof], row);
        writer.accept(&Snapshot {
            t,
            u: &self.state.u,
            v: &self.state.v,
            a: &self.state.a,
        });

        Ok(())
    }

    /// Drive the run to completion and return the diagnostic time series
    pub fn run<F, W>(&mut self, force: &F, writer: &mut W) -> SolverResult<&TimeSeries>
    where
        F: ForceEvaluator,
        W: SnapshotWriter,
    {
        while !self.is_complete() {
            self.step(force, writer)?;
        }
        log::info!(
            "completed {} steps to t = {:.6}",
            self.step_num,
            self.state.t
        );
        Ok(&self.series)
    }
}
