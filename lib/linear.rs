//! Tridiagonal (optionally cyclic) linear systems and the Crank-Nicolson
//! propagator for the linear part of the orbital equations,
//! ```text
//! i ∂φ/∂t = h φ,  h = a2 ∂² + a1 ∂ + V
//! ```
//! discretized as
//! ```text
//! (i - dt/2 h) φ(t + dt) = (i + dt/2 h) φ(t)
//! ```

use ndarray::{ self as nd, s };
use ndarray::parallel::prelude::*;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use serde::Deserialize;
use crate::{
    Arr1,
    Arr2,
    domain::{ Boundary, Domain },
    error::{ LengthError, NumError },
};

pub type NResult<T> = Result<T, NumError>;

/// Solving method for cyclic tridiagonal systems.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclicSolver {
    /// Rank-one Sherman-Morrison correction of a plain tridiagonal solve.
    #[default]
    ShermanMorrison,
    /// Block LU factorization bordering the leading tridiagonal block.
    Lu,
}

/// Corner entries of a cyclic tridiagonal matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Corners {
    /// `A[0, n - 1]`
    pub top_right: C64,
    /// `A[n - 1, 0]`
    pub bottom_left: C64,
}

/// A tridiagonal matrix, optionally with the two corner entries of a cyclic
/// system.
#[derive(Clone, Debug, PartialEq)]
pub struct Tridiag {
    // A[i + 1, i], length n - 1
    sub: nd::Array1<C64>,
    // A[i, i], length n
    diag: nd::Array1<C64>,
    // A[i, i + 1], length n - 1
    sup: nd::Array1<C64>,
    corners: Option<Corners>,
}

// pivots with magnitude at or below this are treated as zero
const PIVOT_MIN: f64 = f64::MIN_POSITIVE;

// solve a plain tridiagonal system by forward elimination and back substitution
fn thomas<S, T, U, V>(
    sub: &Arr1<S>,
    diag: &Arr1<T>,
    sup: &Arr1<U>,
    b: &Arr1<V>,
) -> NResult<nd::Array1<C64>>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
    U: nd::Data<Elem = C64>,
    V: nd::Data<Elem = C64>,
{
    let n = diag.len();
    LengthError::check(diag, b)?;
    let mut cp: nd::Array1<C64> = nd::Array1::zeros(n);
    let mut dp: nd::Array1<C64> = nd::Array1::zeros(n);
    if diag[0].norm() <= PIVOT_MIN { return Err(NumError::ZeroPivot(0)); }
    if n > 1 { cp[0] = sup[0] / diag[0]; }
    dp[0] = b[0] / diag[0];
    for i in 1..n {
        let piv = diag[i] - sub[i - 1] * cp[i - 1];
        if piv.norm() <= PIVOT_MIN { return Err(NumError::ZeroPivot(i)); }
        if i < n - 1 { cp[i] = sup[i] / piv; }
        dp[i] = (b[i] - sub[i - 1] * dp[i - 1]) / piv;
    }
    for i in (0..n - 1).rev() {
        let next = dp[i + 1];
        dp[i] -= cp[i] * next;
    }
    Ok(dp)
}

impl Tridiag {
    /// Create a new non-cyclic tridiagonal matrix.
    ///
    /// *Panics if `sub` or `sup` is not one element shorter than `diag`*.
    pub fn new(
        sub: nd::Array1<C64>,
        diag: nd::Array1<C64>,
        sup: nd::Array1<C64>,
    ) -> Self
    {
        let n = diag.len();
        assert!(n >= 1, "Tridiag::new: empty matrix");
        assert_eq!(sub.len(), n - 1, "Tridiag::new: bad subdiagonal length");
        assert_eq!(sup.len(), n - 1, "Tridiag::new: bad superdiagonal length");
        Self { sub, diag, sup, corners: None }
    }

    /// Create a new cyclic tridiagonal matrix.
    ///
    /// *Panics if `diag` has fewer than 3 elements, or if `sub` or `sup` is not
    /// one element shorter than `diag`*.
    pub fn new_cyclic(
        sub: nd::Array1<C64>,
        diag: nd::Array1<C64>,
        sup: nd::Array1<C64>,
        corners: Corners,
    ) -> Self
    {
        assert!(diag.len() >= 3, "Tridiag::new_cyclic: need at least 3 rows");
        let mut new = Self::new(sub, diag, sup);
        new.corners = Some(corners);
        new
    }

    /// Number of rows.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.diag.len() }

    /// Return `true` if the matrix has corner entries.
    pub fn is_cyclic(&self) -> bool { self.corners.is_some() }

    /// Get the corner entries, if any.
    pub fn corners(&self) -> Option<Corners> { self.corners }

    /// Return `alpha I + beta A`.
    pub fn shifted(&self, alpha: C64, beta: C64) -> Self {
        Self {
            sub: self.sub.mapv(|a| beta * a),
            diag: self.diag.mapv(|a| alpha + beta * a),
            sup: self.sup.mapv(|a| beta * a),
            corners: self.corners.map(|Corners { top_right, bottom_left }| {
                Corners {
                    top_right: beta * top_right,
                    bottom_left: beta * bottom_left,
                }
            }),
        }
    }

    /// Expand into a dense matrix.
    pub fn to_dense(&self) -> nd::Array2<C64> {
        let n = self.len();
        let mut A: nd::Array2<C64> = nd::Array2::zeros((n, n));
        A.diag_mut().assign(&self.diag);
        A.slice_mut(s![1..n, 0..n - 1]).diag_mut().assign(&self.sub);
        A.slice_mut(s![0..n - 1, 1..n]).diag_mut().assign(&self.sup);
        if let Some(Corners { top_right, bottom_left }) = self.corners {
            A[[0, n - 1]] += top_right;
            A[[n - 1, 0]] += bottom_left;
        }
        A
    }

    /// Convert to three-entries-per-row storage.
    ///
    /// *Panics if the matrix has fewer than 2 rows*.
    pub fn to_band(&self) -> BandMatrix {
        let n = self.len();
        assert!(n >= 2, "Tridiag::to_band: need at least 2 rows");
        let Corners { top_right, bottom_left }
            = self.corners.unwrap_or(Corners {
                top_right: C64::zero(),
                bottom_left: C64::zero(),
            });
        let mut vals: nd::Array2<C64> = nd::Array2::zeros((n, 3));
        let mut cols: nd::Array2<usize> = nd::Array2::zeros((n, 3));
        vals.row_mut(0).assign(&nd::array![self.diag[0], self.sup[0], top_right]);
        cols.row_mut(0).assign(&nd::array![0, 1, n - 1]);
        for i in 1..n - 1 {
            vals.row_mut(i)
                .assign(&nd::array![self.sub[i - 1], self.diag[i], self.sup[i]]);
            cols.row_mut(i).assign(&nd::array![i - 1, i, i + 1]);
        }
        vals.row_mut(n - 1)
            .assign(&nd::array![bottom_left, self.sub[n - 2], self.diag[n - 1]]);
        cols.row_mut(n - 1).assign(&nd::array![0, n - 2, n - 1]);
        BandMatrix { vals, cols }
    }

    /// Compute the determinant by the three-term continuant recurrence,
    /// ignoring any corner entries.
    pub fn determinant(&self) -> C64 {
        let mut prev = C64::from(1.0);
        let mut cur = self.diag[0];
        for i in 1..self.len() {
            let next = self.diag[i] * cur - self.sub[i - 1] * self.sup[i - 1] * prev;
            prev = cur;
            cur = next;
        }
        cur
    }

    /// Solve `A x = b` by Gaussian elimination, ignoring any corner entries.
    pub fn solve_thomas<S>(&self, b: &Arr1<S>) -> NResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        thomas(&self.sub, &self.diag, &self.sup, b)
    }

    /// Solve the cyclic system `A x = b` as a plain tridiagonal system with a
    /// rank-one Sherman-Morrison correction.
    ///
    /// Falls back to [`Self::solve_thomas`] if the matrix is not cyclic.
    pub fn solve_sherman_morrison<S>(&self, b: &Arr1<S>)
        -> NResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        let Some(Corners { top_right: beta, bottom_left: alpha }) = self.corners
            else { return self.solve_thomas(b); };
        let n = self.len();
        let gamma
            = if self.diag[0].norm() > PIVOT_MIN { -self.diag[0] }
            else { C64::from(1.0) };
        let mut diag = self.diag.clone();
        diag[0] -= gamma;
        diag[n - 1] -= alpha * beta / gamma;
        let x = thomas(&self.sub, &diag, &self.sup, b)?;
        let mut u: nd::Array1<C64> = nd::Array1::zeros(n);
        u[0] = gamma;
        u[n - 1] = alpha;
        let z = thomas(&self.sub, &diag, &self.sup, &u)?;
        let denom = C64::from(1.0) + z[0] + beta * z[n - 1] / gamma;
        if denom.norm() <= PIVOT_MIN { return Err(NumError::SingularCorrection); }
        let fact = (x[0] + beta * x[n - 1] / gamma) / denom;
        Ok(nd::Zip::from(&x).and(&z).map_collect(|xi, zi| xi - fact * zi))
    }

    /// Solve the cyclic system `A x = b` by block elimination of the last row
    /// and column against the leading tridiagonal block.
    ///
    /// Falls back to [`Self::solve_thomas`] if the matrix is not cyclic.
    pub fn solve_bordered_lu<S>(&self, b: &Arr1<S>) -> NResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        let Some(Corners { top_right, bottom_left }) = self.corners
            else { return self.solve_thomas(b); };
        let n = self.len();
        LengthError::check(&self.diag, b)?;
        let sub = self.sub.slice(s![..n - 2]);
        let diag = self.diag.slice(s![..n - 1]);
        let sup = self.sup.slice(s![..n - 2]);
        // last column and last row, restricted to the leading block
        let mut col: nd::Array1<C64> = nd::Array1::zeros(n - 1);
        col[0] += top_right;
        col[n - 2] += self.sup[n - 2];
        let mut row: nd::Array1<C64> = nd::Array1::zeros(n - 1);
        row[0] += bottom_left;
        row[n - 2] += self.sub[n - 2];
        let y = thomas(&sub, &diag, &sup, &b.slice(s![..n - 1]))?;
        let z = thomas(&sub, &diag, &sup, &col)?;
        let schur = self.diag[n - 1] - row.dot(&z);
        if schur.norm() <= PIVOT_MIN { return Err(NumError::SingularCorrection); }
        let xn = (b[n - 1] - row.dot(&y)) / schur;
        let mut x: nd::Array1<C64> = nd::Array1::zeros(n);
        nd::Zip::from(x.slice_mut(s![..n - 1])).and(&y).and(&z)
            .for_each(|xi, yi, zi| { *xi = yi - zi * xn; });
        x[n - 1] = xn;
        Ok(x)
    }

    /// Solve `A x = b`, using `solver` if the matrix is cyclic.
    pub fn solve<S>(&self, b: &Arr1<S>, solver: CyclicSolver)
        -> NResult<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        match solver {
            CyclicSolver::ShermanMorrison => self.solve_sherman_morrison(b),
            CyclicSolver::Lu => self.solve_bordered_lu(b),
        }
    }
}

/// Row-major sparse matrix with exactly three stored entries per row.
///
/// Interior rows hold their tridiagonal entries; the first and last rows also
/// hold the wrap-around couplings of a cyclic system (zero otherwise).
#[derive(Clone, Debug, PartialEq)]
pub struct BandMatrix {
    vals: nd::Array2<C64>,
    cols: nd::Array2<usize>,
}

impl BandMatrix {
    /// Number of rows.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.vals.nrows() }

    /// Compute `A x`.
    ///
    /// *Panics if `x` has the wrong length*.
    pub fn matvec<S>(&self, x: &Arr1<S>) -> nd::Array1<C64>
    where S: nd::Data<Elem = C64>
    {
        assert_eq!(x.len(), self.len(), "BandMatrix::matvec: bad vector length");
        nd::Zip::from(self.vals.rows()).and(self.cols.rows())
            .map_collect(|v, c| {
                v.iter().zip(c.iter())
                    .map(|(vj, cj)| vj * x[*cj])
                    .sum::<C64>()
            })
    }
}

/// Implicit Crank-Nicolson step for the linear part of the orbital equations
/// at a fixed time step.
///
/// The system is solved over the first `Mpos - 1` grid points; the last point
/// copies the first for periodic boundaries and is zero for hard walls. The
/// descriptor must be rebuilt whenever the time step changes.
#[derive(Clone, Debug)]
pub struct CrankNicolson {
    dt: C64,
    lhs: Tridiag,
    rhs: BandMatrix,
    boundary: Boundary,
    solver: CyclicSolver,
}

impl CrankNicolson {
    /// Build the system for time step `dt`, which may be complex (`dt = -i dτ`
    /// for imaginary time).
    pub fn new(domain: &Domain, dt: C64, solver: CyclicSolver) -> Self {
        let h = domain.single_particle();
        let lhs = h.shifted(C64::i(), -dt / 2.0);
        let rhs = h.shifted(C64::i(), dt / 2.0).to_band();
        Self { dt, lhs, rhs, boundary: domain.boundary(), solver }
    }

    /// Time step the system was built for.
    pub fn dt(&self) -> C64 { self.dt }

    /// Advance a single orbital in place.
    pub fn step_orbital<S>(&self, phi: &mut Arr1<S>) -> NResult<()>
    where S: nd::DataMut<Elem = C64>
    {
        let n = self.lhs.len();
        LengthError::check_len(n + 1, phi.len())?;
        let b = self.rhs.matvec(&phi.slice(s![..n]));
        let x = self.lhs.solve(&b, self.solver)?;
        phi.slice_mut(s![..n]).assign(&x);
        phi[n] = match self.boundary {
            Boundary::Periodic => phi[0],
            Boundary::HardWall => C64::zero(),
        };
        Ok(())
    }

    /// Advance every row of `orb` in place, in parallel.
    pub fn step<S>(&self, orb: &mut Arr2<S>) -> NResult<()>
    where S: nd::DataMut<Elem = C64>
    {
        orb.axis_iter_mut(nd::Axis(0)).into_par_iter()
            .try_for_each(|mut phi| self.step_orbital(&mut phi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cyclic(n: usize) -> Tridiag {
        let sub: nd::Array1<C64>
            = (0..n - 1).map(|i| C64::new(0.3 + 0.01 * i as f64, -0.1)).collect();
        let diag: nd::Array1<C64>
            = (0..n).map(|i| C64::new(2.0 + 0.1 * i as f64, 0.5)).collect();
        let sup: nd::Array1<C64>
            = (0..n - 1).map(|i| C64::new(-0.4, 0.02 * i as f64)).collect();
        let corners = Corners {
            top_right: C64::new(0.25, 0.1),
            bottom_left: C64::new(-0.2, 0.3),
        };
        Tridiag::new_cyclic(sub, diag, sup, corners)
    }

    fn known(n: usize) -> nd::Array1<C64> {
        (0..n).map(|i| C64::new((0.3 * i as f64).sin(), (0.2 * i as f64).cos()))
            .collect()
    }

    fn close(a: &nd::Array1<C64>, b: &nd::Array1<C64>, tol: f64) -> bool {
        a.iter().zip(b).all(|(ai, bi)| (ai - bi).norm() < tol)
    }

    #[test]
    fn band_matches_dense() {
        for &n in &[3_usize, 4, 9] {
            let A = test_cyclic(n);
            let x = known(n);
            assert!(close(&A.to_band().matvec(&x), &A.to_dense().dot(&x), 1e-14));
        }
    }

    #[test]
    fn thomas_round_trip() {
        let A = test_cyclic(10);
        let plain = Tridiag::new(A.sub.clone(), A.diag.clone(), A.sup.clone());
        let x = known(10);
        let b = plain.to_dense().dot(&x);
        assert!(close(&plain.solve_thomas(&b).unwrap(), &x, 1e-12));
        assert!(close(&plain.solve(&b, CyclicSolver::Lu).unwrap(), &x, 1e-12));
    }

    #[test]
    fn cyclic_round_trip() {
        for &n in &[3_usize, 5, 16] {
            let A = test_cyclic(n);
            let x = known(n);
            let b = A.to_band().matvec(&x);
            let sm = A.solve(&b, CyclicSolver::ShermanMorrison).unwrap();
            let lu = A.solve(&b, CyclicSolver::Lu).unwrap();
            assert!(close(&sm, &x, 1e-12));
            assert!(close(&lu, &x, 1e-12));
        }
    }

    #[test]
    fn zero_pivot() {
        let A = Tridiag::new(
            nd::array![C64::from(1.0)],
            nd::array![C64::from(0.0), C64::from(1.0)],
            nd::array![C64::from(1.0)],
        );
        let b = nd::array![C64::from(1.0), C64::from(1.0)];
        assert!(matches!(A.solve_thomas(&b), Err(NumError::ZeroPivot(0))));
    }

    #[test]
    fn determinant_matches_expansion() {
        // [[2, 1, 0], [1, 3, 1], [0, 1, 4]] has determinant 18
        let A = Tridiag::new(
            nd::array![C64::from(1.0), C64::from(1.0)],
            nd::array![C64::from(2.0), C64::from(3.0), C64::from(4.0)],
            nd::array![C64::from(1.0), C64::from(1.0)],
        );
        assert!((A.determinant() - 18.0).norm() < 1e-14);
        let B = test_cyclic(6);
        let plain = Tridiag::new(B.sub.clone(), B.diag.clone(), B.sup.clone());
        let d = plain.to_dense();
        // forward elimination of the dense matrix
        let mut d = d;
        let mut det = C64::from(1.0);
        for i in 0..6 {
            det *= d[[i, i]];
            for r in i + 1..6 {
                let f = d[[r, i]] / d[[i, i]];
                for c in i..6 {
                    let v = d[[i, c]];
                    d[[r, c]] -= f * v;
                }
            }
        }
        assert!((plain.determinant() - det).norm() < 1e-10 * det.norm());
    }
}
