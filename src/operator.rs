#![allow(non_snake_case)]

//! Matrix operators and boundary-condition elimination shared by the solver.

use crate::error::{SolverError, SolverResult};
use crate::prelude::*;

//------------------------------------------------------------------------------
// Operator
//------------------------------------------------------------------------------

/// Square operator on the dof vector (mass, damping, stiffness, or any
/// linear combination of them). Storage is dense; the bilinear forms that
/// produce these matrices make them symmetric, but correctness here does not
/// depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    A: MatrixD,
}

impl Operator {
    pub fn from_matrix(A: MatrixD) -> Self {
        assert_eq!(A.nrows(), A.ncols(), "operator must be square");
        Operator { A }
    }

    pub fn zeros(ndofs: usize) -> Self {
        Operator {
            A: MatrixD::zeros(ndofs, ndofs),
        }
    }

    /// Number of degrees of freedom
    pub fn dim(&self) -> usize {
        self.A.nrows()
    }

    pub fn matrix(&self) -> &MatrixD {
        &self.A
    }

    /// y = Op * x
    pub fn apply(&self, x: &VectorD) -> VectorD {
        &self.A * x
    }

    /// Linear combination sum(c_i * Op_i) of same-sized operators
    pub fn combine(terms: &[(f64, &Operator)]) -> Operator {
        let n = terms[0].1.dim();
        let mut A = MatrixD::zeros(n, n);
        for &(c, op) in terms {
            assert_eq!(op.dim(), n, "operator dimensions must match");
            A += c * &op.A;
        }
        Operator { A }
    }

    /// Zero the row and column of each constrained dof and set the diagonal
    /// entry to 1, keeping the operator symmetric and nonsingular
    pub fn eliminate(&mut self, dofs: &[usize]) {
        for &i in dofs {
            self.A.row_mut(i).fill(0.);
            self.A.column_mut(i).fill(0.);
            self.A[(i, i)] = 1.;
        }
    }

    /// Row-sum (lumped) diagonal
    pub fn lumped(&self) -> VectorD {
        self.A.column_sum()
    }

    /// One-time direct decomposition for repeated solves. The operators fed
    /// to this are SPD by construction, so a failed factorization means the
    /// assembled system is defective.
    pub fn factorize(&self) -> SolverResult<CholeskyD> {
        self.A.clone().cholesky().ok_or(SolverError::SingularSystem)
    }
}

/// Rayleigh damping C = eta_m * M + eta_k * K
pub fn rayleigh_damping(M: &Operator, K: &Operator, eta_m: f64, eta_k: f64) -> Operator {
    Operator::combine(&[(eta_m, M), (eta_k, K)])
}

//------------------------------------------------------------------------------
// Boundary conditions
//------------------------------------------------------------------------------

/// Set of (dof, prescribed value) pairs. Must be baked into every operator
/// entering the effective system and into the per-step load vector; skipping
/// any one of them lets a constrained dof drift.
#[derive(Debug, Clone, Default)]
pub struct BoundaryConditionSet {
    constraints: Vec<(usize, f64)>,
}

impl BoundaryConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix a dof at zero (homogeneous support)
    pub fn fix(&mut self, dof: usize) {
        self.prescribe(dof, 0.);
    }

    pub fn prescribe(&mut self, dof: usize, value: f64) {
        self.constraints.push((dof, value));
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn dofs(&self) -> Vec<usize> {
        self.constraints.iter().map(|&(dof, _)| dof).collect_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, f64)> {
        self.constraints.iter()
    }

    /// Zero each constrained row and column and place 1 on the diagonal
    pub fn apply_to_matrix(&self, op: &mut Operator) {
        op.eliminate(&self.dofs());
    }

    /// Set each constrained row to its prescribed value (0 for the
    /// homogeneous supports used throughout)
    pub fn apply_to_vector(&self, b: &mut VectorD) {
        for &(dof, value) in &self.constraints {
            b[dof] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spring_chain() -> Operator {
        // Two-element spring chain, k = 1
        Operator::from_matrix(MatrixD::from_row_slice(
            3,
            3,
            &[1., -1., 0., -1., 2., -1., 0., -1., 1.],
        ))
    }

    #[test]
    fn test_apply() {
        let K = spring_chain();
        let x = VectorD::from_vec(vec![1., 2., 3.]);
        assert_relative_eq!(K.apply(&x), VectorD::from_vec(vec![-1., 0., 1.]));
    }

    #[test]
    fn test_combine() {
        let M = Operator::from_matrix(MatrixD::identity(3, 3));
        let K = spring_chain();
        let A = Operator::combine(&[(2., &M), (0.5, &K)]);
        assert_relative_eq!(A.matrix()[(0, 0)], 2.5);
        assert_relative_eq!(A.matrix()[(0, 1)], -0.5);
        assert_relative_eq!(A.matrix()[(1, 1)], 3.);
    }

    #[test]
    fn test_eliminate_keeps_symmetry() {
        let mut K = spring_chain();
        K.eliminate(&[0]);
        let A = K.matrix();
        assert_relative_eq!(A[(0, 0)], 1.);
        assert_relative_eq!(A[(0, 1)], 0.);
        assert_relative_eq!(A[(1, 0)], 0.);
        assert_relative_eq!(A.transpose(), A.clone_owned());
    }

    #[test]
    fn test_eliminated_operator_factorizes() {
        // The free chain is singular; pinning one end makes it SPD
        let mut K = spring_chain();
        assert!(K.factorize().is_err());
        K.eliminate(&[0]);
        let chol = K.factorize().unwrap();
        let x = chol.solve(&VectorD::from_vec(vec![0., 0., 1.]));
        assert_relative_eq!(x, VectorD::from_vec(vec![0., 1., 2.]), epsilon = 1e-12);
    }

    #[test]
    fn test_lumped_row_sums() {
        let M = Operator::from_matrix(MatrixD::from_row_slice(
            2,
            2,
            &[2., 1., 1., 2.],
        ));
        assert_relative_eq!(M.lumped(), VectorD::from_vec(vec![3., 3.]));
    }

    #[test]
    fn test_rayleigh_damping() {
        let M = Operator::from_matrix(MatrixD::identity(3, 3));
        let K = spring_chain();
        let C = rayleigh_damping(&M, &K, 0.1, 0.01);
        assert_relative_eq!(C.matrix()[(1, 1)], 0.1 + 0.02);
        assert_relative_eq!(C.matrix()[(1, 2)], -0.01);
    }

    #[test]
    fn test_bcs_apply_to_vector() {
        let mut bcs = BoundaryConditionSet::new();
        bcs.fix(0);
        bcs.prescribe(2, 0.5);
        let mut b = VectorD::from_vec(vec![9., 9., 9.]);
        bcs.apply_to_vector(&mut b);
        assert_relative_eq!(b, VectorD::from_vec(vec![0., 9., 0.5]));
    }
}
