//! Load-time compilation of RBF solvers.
//!
//! Interpolation weights over the target poses come from the classic RBF
//! system: with kernel matrix `A[i][j] = phi(|c_i - c_j|)`, the weight of
//! pose `j` at query `q` is `sum_i phi(|q - c_i|) * inv(A)[i][j]`. Inverting
//! `A` once at document load makes the per-tick cost a kernel evaluation per
//! pose plus one mat-vec, and evaluating exactly at a target pose reproduces
//! that pose's outputs with no blending error (the phi vector is then a row
//! of `A` itself). No diagonal regularization is added for the same reason;
//! a singular pose set is rejected at load instead.

use nalgebra::DMatrix;

use crate::{
    dna::behavior::{RbfKernel, RbfSolver},
    foundation::error::{RigDnaError, RigDnaResult},
};

#[derive(Debug)]
pub(crate) struct CompiledRbf {
    pub(crate) targets: Vec<Vec<f64>>,
    pub(crate) kernel: RbfKernel,
    inverse: DMatrix<f64>,
}

impl CompiledRbf {
    pub(crate) fn compile(solver: &RbfSolver) -> RigDnaResult<Self> {
        let n = solver.poses.len();
        let targets: Vec<Vec<f64>> = solver
            .poses
            .iter()
            .map(|pose| pose.target.iter().map(|&x| f64::from(x)).collect())
            .collect();

        let mut matrix = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let r = distance(&targets[i], &targets[j]);
                matrix[(i, j)] = kernel_value(solver.kernel, r);
            }
        }

        let inverse = matrix.lu().try_inverse().ok_or_else(|| {
            RigDnaError::validation(format!(
                "RBF solver '{}': kernel matrix is singular (duplicate or \
                 degenerate target poses)",
                solver.name
            ))
        })?;

        Ok(Self {
            targets,
            kernel: solver.kernel,
            inverse,
        })
    }

    /// Number of target poses.
    pub(crate) fn pose_count(&self) -> usize {
        self.targets.len()
    }

    /// Interpolation weights over the poses at `query`, written into `out`.
    /// `phi` is caller-provided scratch; both slices are `pose_count` long.
    pub(crate) fn weights_into(&self, query: &[f64], phi: &mut [f64], out: &mut [f64]) {
        let n = self.pose_count();
        for i in 0..n {
            phi[i] = kernel_value(self.kernel, distance(query, &self.targets[i]));
        }
        for j in 0..n {
            let mut acc = 0.0;
            for i in 0..n {
                acc += phi[i] * self.inverse[(i, j)];
            }
            out[j] = acc;
        }
    }
}

pub(crate) fn kernel_value(kernel: RbfKernel, r: f64) -> f64 {
    match kernel {
        RbfKernel::Gaussian { width } => {
            let s = r / f64::from(width);
            (-s * s).exp()
        }
        RbfKernel::ThinPlate => {
            if r < 1e-12 {
                0.0
            } else {
                r * r * r.ln()
            }
        }
        RbfKernel::Multiquadric { c } => {
            let c = f64::from(c);
            (r * r + c * c).sqrt()
        }
        RbfKernel::InverseMultiquadric { c } => {
            let c = f64::from(c);
            1.0 / (r * r + c * c).sqrt()
        }
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
#[path = "../../tests/unit/eval/rbf.rs"]
mod tests;
