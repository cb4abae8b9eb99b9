//! Dense kernels over a single-precision design matrix.
//!
//! The design matrix is stored as `f32`; every accumulation is carried out in `f64`.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// `X_jᵗ v`
#[inline]
pub fn column_dot(x: &ArrayView2<f32>, j: usize, v: &ArrayView1<f64>) -> f64 {
    x.column(j)
        .iter()
        .zip(v.iter())
        .map(|(&xij, &vi)| xij as f64 * vi)
        .sum()
}

/// `Σ_i X_ij w_i v_i`
#[inline]
pub fn weighted_column_dot(
    x: &ArrayView2<f32>,
    j: usize,
    w: &ArrayView1<f64>,
    v: &ArrayView1<f64>,
) -> f64 {
    x.column(j)
        .iter()
        .zip(w.iter().zip(v.iter()))
        .map(|(&xij, (&wi, &vi))| xij as f64 * wi * vi)
        .sum()
}

/// `v += a · X_j`
#[inline]
pub fn column_axpy(x: &ArrayView2<f32>, j: usize, a: f64, v: &mut Array1<f64>) {
    if a == 0.0 {
        return;
    }
    v.iter_mut()
        .zip(x.column(j).iter())
        .for_each(|(vi, &xij)| *vi += a * xij as f64);
}

/// `X b`
pub fn matvec(x: &ArrayView2<f32>, b: &ArrayView1<f64>) -> Array1<f64> {
    let mut out = Array1::zeros(x.nrows());
    for (j, &bj) in b.iter().enumerate() {
        column_axpy(x, j, bj, &mut out);
    }
    out
}

/// `Xᵗ v`
pub fn matvec_t(x: &ArrayView2<f32>, v: &ArrayView1<f64>) -> Array1<f64> {
    Array1::from_shape_fn(x.ncols(), |j| column_dot(x, j, v))
}

/// Column sums of squares, `Σ_i X_ij²`.
pub fn column_sum_sq(x: &ArrayView2<f32>) -> Array1<f64> {
    x.axis_iter(Axis(1))
        .map(|col| col.iter().map(|&v| (v as f64) * (v as f64)).sum())
        .collect()
}

/// Weighted column sums of squares, `Σ_i w_i X_ij²`.
pub fn weighted_column_sum_sq(x: &ArrayView2<f32>, w: &ArrayView1<f64>) -> Array1<f64> {
    x.axis_iter(Axis(1))
        .map(|col| {
            col.iter()
                .zip(w.iter())
                .map(|(&v, &wi)| wi * (v as f64) * (v as f64))
                .sum()
        })
        .collect()
}

/// Population variance of every column.
pub fn column_var(x: &ArrayView2<f32>) -> Array1<f64> {
    let n = x.nrows() as f64;
    x.axis_iter(Axis(1))
        .map(|col| {
            let mean = col.iter().map(|&v| v as f64).sum::<f64>() / n;
            col.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn products_match_dense_algebra() {
        let x = array![[1.0f32, 2.0], [3.0, -1.0], [0.5, 4.0]];
        let b = array![0.5, -2.0];
        let xb = matvec(&x.view(), &b.view());
        assert_relative_eq!(xb[0], 0.5 - 4.0);
        assert_relative_eq!(xb[1], 1.5 + 2.0);
        assert_relative_eq!(xb[2], 0.25 - 8.0);

        let v = array![1.0, 1.0, 2.0];
        let xtv = matvec_t(&x.view(), &v.view());
        assert_relative_eq!(xtv[0], 1.0 + 3.0 + 1.0);
        assert_relative_eq!(xtv[1], 2.0 - 1.0 + 8.0);
    }

    #[test]
    fn column_summaries() {
        let x = array![[1.0f32, 0.0], [-1.0, 2.0], [3.0, 4.0]];
        let ss = column_sum_sq(&x.view());
        assert_relative_eq!(ss[0], 11.0);
        assert_relative_eq!(ss[1], 20.0);

        let w = array![1.0, 0.5, 0.0];
        let wss = weighted_column_sum_sq(&x.view(), &w.view());
        assert_relative_eq!(wss[0], 1.5);
        assert_relative_eq!(wss[1], 2.0);

        let var = column_var(&x.view());
        assert_relative_eq!(var[0], 8.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(var[1], 8.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn axpy_skips_zero_scale() {
        let x = array![[1.0f32], [2.0]];
        let mut v = array![1.0, 1.0];
        column_axpy(&x.view(), 0, 0.0, &mut v);
        assert_eq!(v, array![1.0, 1.0]);
        column_axpy(&x.view(), 0, -1.0, &mut v);
        assert_eq!(v, array![0.0, -1.0]);
    }
}
