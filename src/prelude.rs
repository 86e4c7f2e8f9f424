use nalgebra::Dyn;

pub use itertools::{izip, Itertools};
pub use std::ops::AddAssign;

//------------------------------------------------------------------------------
// Types
//------------------------------------------------------------------------------

/// Matrix (DOFs x DOFs)
pub type MatrixD = nalgebra::OMatrix<f64, Dyn, Dyn>;

/// Matrix (3 x Nodes)
pub type Matrix3xX = nalgebra::Matrix3xX<f64>;

pub type Vector3 = nalgebra::Vector3<f64>;

/// Column vector (Degrees of Freedom)
pub type VectorD = nalgebra::DVector<f64>;

/// Direct decomposition of a symmetric positive-definite operator
pub type CholeskyD = nalgebra::Cholesky<f64, Dyn>;
