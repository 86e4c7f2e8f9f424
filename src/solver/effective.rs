#![allow(non_snake_case)]

//! Effective system A = M + gamma*h*C + beta*h^2*K, built once per run.

use crate::error::{SolverError, SolverResult};
use crate::operator::{BoundaryConditionSet, Operator};
use crate::prelude::*;
use crate::solver::StepConfig;

/// Reusable per-step solve operator. The two variants are mutually
/// exclusive, selected once at construction and never switched mid-run.
pub enum EffectiveSystem {
    /// Direct decomposition of the assembled effective operator; each step
    /// costs one forward/back substitution.
    Factorized(CholeskyD),
    /// Element-wise inverse of the lumped diagonal; each step costs one
    /// component-wise product. Valid only for beta = 0, gamma = 1/2, where
    /// the scheme degenerates to central difference.
    Lumped(VectorD),
}

impl EffectiveSystem {
    /// a = A^-1 f
    pub fn solve(&self, f: &VectorD) -> VectorD {
        match self {
            EffectiveSystem::Factorized(chol) => chol.solve(f),
            EffectiveSystem::Lumped(inv) => f.component_mul(inv),
        }
    }
}

pub struct EffectiveSystemBuilder<'a> {
    M: &'a Operator,
    C: &'a Operator,
    K: &'a Operator,
    bcs: &'a BoundaryConditionSet,
    config: &'a StepConfig,
}

impl<'a> EffectiveSystemBuilder<'a> {
    pub fn new(
        M: &'a Operator,
        C: &'a Operator,
        K: &'a Operator,
        bcs: &'a BoundaryConditionSet,
        config: &'a StepConfig,
    ) -> Self {
        EffectiveSystemBuilder {
            M,
            C,
            K,
            bcs,
            config,
        }
    }

    pub fn build(&self) -> SolverResult<EffectiveSystem> {
        self.config.validate()?;
        if self.config.use_lumped_mass {
            self.build_lumped()
        } else {
            self.build_factorized()
        }
    }

    fn build_factorized(&self) -> SolverResult<EffectiveSystem> {
        let h = self.config.h;
        let mut A = Operator::combine(&[
            (1., self.M),
            (self.config.gamma * h, self.C),
            (self.config.beta * h * h, self.K),
        ]);
        self.bcs.apply_to_matrix(&mut A);
        log::debug!("factorizing effective system ({} dofs)", A.dim());
        Ok(EffectiveSystem::Factorized(A.factorize()?))
    }

    fn build_lumped(&self) -> SolverResult<EffectiveSystem> {
        // Row-sum mass with the half-step damping correction
        let h = self.config.h;
        let mut d = self.M.lumped() + 0.5 * h * self.C.lumped();
        for dof in self.bcs.dofs() {
            d[dof] = 1.;
        }
        if d.min() <= 0. {
            return Err(SolverError::SingularSystem);
        }
        Ok(EffectiveSystem::Lumped(d.map(|m| 1. / m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_dof() -> (Operator, Operator, Operator) {
        let M = Operator::from_matrix(MatrixD::from_row_slice(2, 2, &[2., 0., 0., 1.]));
        let C = Operator::from_matrix(MatrixD::from_row_slice(2, 2, &[0.1, 0., 0., 0.1]));
        let K = Operator::from_matrix(MatrixD::from_row_slice(2, 2, &[30., -10., -10., 10.]));
        (M, C, K)
    }

    #[test]
    fn test_lumped_mode_rejected_for_implicit_parameters() {
        let (M, C, K) = two_dof();
        let bcs = BoundaryConditionSet::new();
        let config = StepConfig::average_acceleration(0.01, 10).with_lumped_mass();
        let result = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, &config).build();
        assert!(matches!(result, Err(SolverError::Configuration(_))));
    }

    #[test]
    fn test_lumped_mode_accepted_for_explicit_parameters() {
        let (M, C, K) = two_dof();
        let bcs = BoundaryConditionSet::new();
        let config = StepConfig::central_difference(0.01, 10);
        let system = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, &config)
            .build()
            .unwrap();
        assert!(matches!(system, EffectiveSystem::Lumped(_)));

        // m_eff = rowsum(M) + h/2 * rowsum(C)
        let f = VectorD::from_vec(vec![1., 1.]);
        let a = system.solve(&f);
        assert_relative_eq!(a[0], 1. / (2. + 0.005 * 0.1), epsilon = 1e-14);
        assert_relative_eq!(a[1], 1. / (1. + 0.005 * 0.1), epsilon = 1e-14);
    }

    #[test]
    fn test_factorized_matches_direct_solve() {
        let (M, C, K) = two_dof();
        let bcs = BoundaryConditionSet::new();
        let config = StepConfig::average_acceleration(0.01, 10);
        let system = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, &config)
            .build()
            .unwrap();

        let h = config.h;
        let A = Operator::combine(&[(1., &M), (config.gamma * h, &C), (config.beta * h * h, &K)]);
        let f = VectorD::from_vec(vec![1., -2.]);
        let a = system.solve(&f);
        assert_relative_eq!(A.apply(&a), f, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_builders_solve_identically() {
        let (M, C, K) = two_dof();
        let bcs = BoundaryConditionSet::new();
        let config = StepConfig::average_acceleration(0.005, 10);
        let s1 = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, &config)
            .build()
            .unwrap();
        let s2 = EffectiveSystemBuilder::new(&M, &C, &K, &bcs, &config)
            .build()
            .unwrap();
        let f = VectorD::from_vec(vec![0.3, -1.7]);
        assert_eq!(s1.solve(&f), s2.solve(&f));
    }

    #[test]
    fn test_singular_effective_system_is_fatal() {
        // Zero mass and stiffness leave nothing to factorize
        let Z = Operator::zeros(2);
        let bcs = BoundaryConditionSet::new();
        let config = StepConfig::average_acceleration(0.01, 10);
        let result = EffectiveSystemBuilder::new(&Z, &Z, &Z, &bcs, &config).build();
        assert!(matches!(result, Err(SolverError::SingularSystem)));
    }
}
