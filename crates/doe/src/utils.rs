use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_stats::DeviationExt;

pub(crate) fn check_xlimits<F: Float>(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) {
    if xlimits.ncols() != 2 {
        panic!("xlimits must have 2 columns (lower, upper)");
    }
}

/// Computes the pairwise distances between rows of a 2D-array,
/// ordered as (0,1), (0,2), ..., (1,2), ...
pub fn pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    let nrows = x.nrows();
    let mut distances = Vec::with_capacity(nrows * nrows.saturating_sub(1) / 2);
    for i in 0..nrows {
        for j in (i + 1)..nrows {
            distances.push(F::cast(x.row(i).l2_dist(&x.row(j)).unwrap()));
        }
    }
    Array1::from_vec(distances)
}

/// Computes the pairwise distances between rows of two 2D arrays
/// The resulting array has shape (ma, mb) where ma is the number of rows in xa and mb is the number of rows in xb
pub fn cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F>, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let na = xa.ncols();
    let nb = xb.ncols();
    if na != nb {
        panic!("cdist: operands should have same nb of columns. Found {na} and {nb}");
    }
    let mut res = Array2::zeros((xa.nrows(), xb.nrows()));
    for (i, row_a) in xa.rows().into_iter().enumerate() {
        for (j, row_b) in xb.rows().into_iter().enumerate() {
            res[[i, j]] = F::cast(row_a.l2_dist(&row_b).unwrap());
        }
    }
    res
}
