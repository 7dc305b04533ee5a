//! Short-time propagation of coefficient vectors in a Krylov subspace.
//!
//! Starting from `v₀ = C / ‖C‖`, the Lanczos recurrence builds an orthonormal
//! basis `{v₀, ..., v_{lm-1}}` of the Krylov space of a Hermitian operator `H`
//! together with the real symmetric tridiagonal projection `T = V† H V`. Every
//! new vector is reorthogonalized against all previous ones. The propagated
//! state is then
//! ```text
//! C(t + dt) ≈ ‖C‖ V U exp(-i Λ dt) Uᵀ e₀
//! ```
//! where `T = U Λ Uᵀ`.

use ndarray as nd;
use ndarray_linalg::{ self as la, EighInto };
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    error::NumError,
    hamiltonian::LinearOperator,
};

pub type NResult<T> = Result<T, NumError>;

/// Default Krylov subspace dimension.
pub const KRYLOV_DIM: usize = 4;

/// Off-diagonal elements of the tridiagonal matrix below this value signal
/// that the Krylov space is exhausted.
pub const BREAKDOWN_TOL: f64 = 1e-12;

/// Lanczos basis and induced tridiagonal matrix.
#[derive(Clone, Debug)]
pub struct Krylov {
    /// Orthonormal basis vectors.
    pub basis: Vec<nd::Array1<C64>>,
    /// Diagonal of the tridiagonal matrix.
    pub diag: Vec<f64>,
    /// Off-diagonal of the tridiagonal matrix (one shorter than `diag`).
    pub offdiag: Vec<f64>,
}

impl Krylov {
    /// Dimension of the subspace actually built.
    pub fn dim(&self) -> usize { self.basis.len() }

    /// Return the tridiagonal matrix as a dense array.
    pub fn tridiag(&self) -> nd::Array2<f64> {
        let n = self.dim();
        let mut T: nd::Array2<f64> = nd::Array2::zeros((n, n));
        T.diag_mut().iter_mut().zip(&self.diag)
            .for_each(|(t, a)| { *t = *a; });
        for (i, b) in self.offdiag.iter().enumerate() {
            T[[i + 1, i]] = *b;
            T[[i, i + 1]] = *b;
        }
        T
    }
}

fn dot(u: &nd::Array1<C64>, w: &nd::Array1<C64>) -> C64 {
    u.iter().zip(w).map(|(uk, wk)| uk.conj() * wk).sum()
}

fn norm(u: &nd::Array1<C64>) -> f64 {
    u.iter().map(|uk| uk.norm_sqr()).sum::<f64>().sqrt()
}

// remove all components of `w` along `basis`
fn reorthogonalize(w: &mut nd::Array1<C64>, basis: &[nd::Array1<C64>]) {
    for v in basis.iter() {
        let proj = dot(v, w);
        w.scaled_add(-proj, v);
    }
}

/// Build at most `lm` Lanczos vectors for `op` starting from the direction of
/// `start`.
///
/// The expansion stops early if an off-diagonal element falls below
/// [`BREAKDOWN_TOL`], in which case the returned basis spans an invariant
/// subspace.
///
/// *Panics if `lm == 0` or `start` is zero*.
pub fn lanczos<O, S>(op: &O, start: &Arr1<S>, lm: usize) -> Krylov
where
    O: LinearOperator,
    S: nd::Data<Elem = C64>,
{
    assert!(lm > 0, "lanczos: subspace dimension must be at least 1");
    let n0 = start.iter().map(|s| s.norm_sqr()).sum::<f64>().sqrt();
    assert!(n0 > 0.0, "lanczos: starting vector must be nonzero");
    let v0: nd::Array1<C64> = start.mapv(|s| s / n0);
    let mut w = op.apply(v0.view());
    let a0 = dot(&v0, &w).re;
    let mut basis: Vec<nd::Array1<C64>> = vec![v0];
    let mut diag: Vec<f64> = vec![a0];
    let mut offdiag: Vec<f64> = Vec::with_capacity(lm);
    reorthogonalize(&mut w, &basis);
    while basis.len() < lm {
        let beta = norm(&w);
        if beta < BREAKDOWN_TOL {
            log::debug!(
                "lanczos: breakdown after {} vectors (beta = {:e})",
                basis.len(), beta,
            );
            break;
        }
        let v = w.mapv(|wk| wk / beta);
        w = op.apply(v.view());
        let alpha = dot(&v, &w).re;
        basis.push(v);
        diag.push(alpha);
        offdiag.push(beta);
        reorthogonalize(&mut w, &basis);
    }
    Krylov { basis, diag, offdiag }
}

/// Propagate `c` by `exp(-i H dt)` within the `lm`-dimensional Krylov space of
/// `op`.
///
/// `dt` may be complex; `dt = -i dτ` gives imaginary-time evolution.
pub fn propagate<O, S>(op: &O, c: &Arr1<S>, dt: C64, lm: usize)
    -> NResult<nd::Array1<C64>>
where
    O: LinearOperator,
    S: nd::Data<Elem = C64>,
{
    let c_norm = c.iter().map(|ck| ck.norm_sqr()).sum::<f64>().sqrt();
    if c_norm == 0.0 { return Ok(c.to_owned()); }
    let krylov = lanczos(op, c, lm);
    let (evals, evecs): (nd::Array1<f64>, nd::Array2<f64>)
        = krylov.tridiag().eigh_into(la::UPLO::Lower)
        .map_err(NumError::KrylovEigh)?;
    // y = U exp(-i Λ dt) Uᵀ e₀
    let phase: nd::Array1<C64>
        = nd::Zip::from(&evals).and(evecs.row(0))
        .map_collect(|lam, u0| (-C64::i() * *lam * dt).exp() * *u0);
    let y: nd::Array1<C64> = evecs.mapv(C64::from).dot(&phase);
    let mut out: nd::Array1<C64> = nd::Array1::zeros(c.len());
    for (v, yj) in krylov.basis.iter().zip(y.iter()) {
        out.scaled_add(*yj * c_norm, v);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_linalg::Eigh;

    // dense Hermitian matrix as an operator
    struct Dense(nd::Array2<C64>);

    impl LinearOperator for Dense {
        fn dim(&self) -> usize { self.0.nrows() }

        fn apply(&self, v: nd::ArrayView1<C64>) -> nd::Array1<C64> {
            self.0.dot(&v)
        }
    }

    fn test_matrix(n: usize) -> nd::Array2<C64> {
        let mut h: nd::Array2<C64> = nd::Array2::zeros((n, n));
        for i in 0..n {
            h[[i, i]] = C64::from(0.5 * i as f64 - 1.0);
            for j in i + 1..n {
                let z = C64::new(0.1 * (i + j) as f64, 0.05 * (j - i) as f64);
                h[[i, j]] = z;
                h[[j, i]] = z.conj();
            }
        }
        h
    }

    fn start(n: usize) -> nd::Array1<C64> {
        (0..n).map(|i| C64::new(1.0 + 0.1 * i as f64, 0.2)).collect()
    }

    #[test]
    fn basis_is_orthonormal() {
        let op = Dense(test_matrix(12));
        let kry = lanczos(&op, &start(12), KRYLOV_DIM);
        assert_eq!(kry.dim(), KRYLOV_DIM);
        for (i, u) in kry.basis.iter().enumerate() {
            for (j, w) in kry.basis.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot(u, w) - expected).norm() < 1e-12);
            }
        }
        // T = V† H V
        for (i, u) in kry.basis.iter().enumerate() {
            let hu = op.apply(u.view());
            for (j, w) in kry.basis.iter().enumerate() {
                assert!((dot(w, &hu) - kry.tridiag()[[j, i]]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn eigenvector_single_vector() {
        let h = test_matrix(6);
        let (evals, evecs) = h.eigh(la::UPLO::Lower).unwrap();
        let op = Dense(h);
        let c = evecs.column(2).to_owned();
        let dt = C64::from(0.37);
        let out = propagate(&op, &c, dt, 1).unwrap();
        let expected = c.mapv(|ck| (-C64::i() * evals[2] * dt).exp() * ck);
        assert!(out.iter().zip(&expected).all(|(a, b)| (a - b).norm() < 1e-12));
    }

    #[test]
    fn eigenvector_breakdown() {
        let h = test_matrix(6);
        let (evals, evecs) = h.eigh(la::UPLO::Lower).unwrap();
        let op = Dense(h);
        let c = evecs.column(4).to_owned();
        assert_eq!(lanczos(&op, &c, KRYLOV_DIM).dim(), 1);
        let dt = C64::from(1.3);
        let out = propagate(&op, &c, dt, KRYLOV_DIM).unwrap();
        let expected = c.mapv(|ck| (-C64::i() * evals[4] * dt).exp() * ck);
        assert!(out.iter().zip(&expected).all(|(a, b)| (a - b).norm() < 1e-10));
    }

    #[test]
    fn full_space_is_exact() {
        let n = 4;
        let h = test_matrix(n);
        let (evals, evecs) = h.eigh(la::UPLO::Lower).unwrap();
        let op = Dense(h);
        let c = start(n);
        let dt = C64::new(0.8, -0.1);
        let out = propagate(&op, &c, dt, n).unwrap();
        // exp(-i H dt) c from the full eigendecomposition
        let proj = evecs.t().mapv(|z| z.conj()).dot(&c);
        let phased = nd::Zip::from(&proj).and(&evals)
            .map_collect(|p, lam| (-C64::i() * *lam * dt).exp() * *p);
        let expected = evecs.dot(&phased);
        assert!(out.iter().zip(&expected).all(|(a, b)| (a - b).norm() < 1e-10));
    }

    #[test]
    fn real_time_preserves_norm() {
        let op = Dense(test_matrix(10));
        let c = start(10);
        let out = propagate(&op, &c, C64::from(0.05), KRYLOV_DIM).unwrap();
        assert!((norm(&out) - norm(&c)).abs() < 1e-12);
    }
}
