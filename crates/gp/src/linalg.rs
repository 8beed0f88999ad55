use crate::errors::{GpError, Result};
use linfa_linalg::{cholesky::*, eigh::*, triangular::*};
use log::warn;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Nugget always added to the kernel matrix diagonal
pub const NUGGET: f64 = 100. * f64::EPSILON;
/// Number of times the diagonal jitter is multiplied by ten before giving up
const MAX_JITTER_TRIES: usize = 6;
/// Eigenvalues below this bound are taken as zero in the eigen factorization
const EIGEN_FLOOR: f64 = 1e-9;

/// Lower Cholesky factor of `a + jitter I`, the jitter starts at [NUGGET] and is
/// increased until the factorization succeeds.
pub fn cholesky_with_jitter(a: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let scale = (0..n).map(|i| a[[i, i]].abs()).fold(1f64, f64::max);
    let mut jitter = NUGGET * scale;
    for attempt in 0..MAX_JITTER_TRIES {
        let mut aj = a.to_owned();
        aj.diag_mut().mapv_inplace(|v| v + jitter);
        match aj.cholesky() {
            Ok(l) if l.iter().all(|v| v.is_finite()) => return Ok(l),
            _ => {
                if attempt == 0 {
                    warn!("Cholesky factorization failed, retry with increasing jitter");
                }
                jitter *= 10.;
            }
        }
    }
    Err(GpError::FactorizationError(format!(
        "matrix ({n}x{n}) is not positive definite even with jitter {jitter:e}"
    )))
}

/// Solves `L L^t x = b` given the lower Cholesky factor `L`
pub fn cholesky_solve(
    l: &Array2<f64>,
    b: &ArrayBase<impl Data<Elem = f64>, Ix2>,
) -> Result<Array2<f64>> {
    let y = l.solve_triangular(b, UPLO::Lower)?;
    Ok(l.t().solve_triangular(&y, UPLO::Upper)?)
}

/// Factor `C` such that `C C^t` approximates the covariance `cov`.
///
/// Cholesky is tried first, when it fails (near-duplicate points make `cov`
/// rank deficient) the factor is built from the eigen decomposition with
/// eigenvalues below a small floor taken as zero.
pub fn psd_factor(cov: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
    if let Ok(l) = cov.cholesky() {
        if l.iter().all(|v| v.is_finite()) {
            return Ok(l);
        }
    }
    let sym = (&cov.view() + &cov.t()) / 2.;
    let (v, w) = sym.eigh_into()?;
    let v = v.mapv(|x| if x < EIGEN_FLOOR { 0. } else { x.sqrt() });
    let d = Array2::from_diag(&v);
    Ok(w.dot(&d))
}
