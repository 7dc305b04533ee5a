//! The spatial grid and the single-particle operator
//! ```text
//! h = a2 ∂² + a1 ∂ + V(x)
//! ```
//! discretized by second-order central differences.
//!
//! The last grid point is never an unknown: with periodic boundaries it
//! duplicates the first point, and with hard walls it is pinned to zero (as is
//! the implicit point one spacing before the first).

use ndarray::{ self as nd, s };
use ndarray_linalg::{ self as la, EighInto };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use serde::Deserialize;
use crate::{
    Arr1,
    error::DomainError,
    linear::{ BandMatrix, Corners, Tridiag },
    utils::orthonormalize,
    DEF_EPSILON,
};

pub type DResult<T> = Result<T, DomainError>;

/// Boundary conditions at the ends of the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// The last grid point is identified with the first.
    Periodic,
    /// Orbitals vanish at the last grid point and just before the first.
    #[default]
    HardWall,
}

impl Boundary {
    /// Return `true` if `self` is `Periodic`.
    pub fn is_periodic(&self) -> bool { matches!(self, Self::Periodic) }
}

/// A uniform one-dimensional grid with a potential and the coefficients of the
/// single-particle operator.
#[derive(Clone, Debug)]
pub struct Domain {
    // coordinate array
    x: nd::Array1<f64>,
    // coordinate array grid spacing
    dx: f64,
    // potential array
    V: nd::Array1<f64>,
    // array sizes
    n: usize,
    // second-derivative coefficient
    a2: f64,
    // first-derivative coefficient
    a1: C64,
    boundary: Boundary,
    // single-particle matrix over the unknowns, in both storage formats
    h: Tridiag,
    band: BandMatrix,
}

fn build_single_particle(
    dx: f64,
    V: &nd::Array1<f64>,
    a2: f64,
    a1: C64,
    boundary: Boundary,
) -> Tridiag
{
    let nu = V.len() - 1;
    let off = a2 / dx.powi(2);
    let sup = off + a1 / (2.0 * dx);
    let sub = off - a1 / (2.0 * dx);
    let diag: nd::Array1<C64>
        = V.slice(s![..nu]).mapv(|Vj| C64::from(-2.0 * off + Vj));
    let sub_arr: nd::Array1<C64> = nd::Array1::from_elem(nu - 1, sub);
    let sup_arr: nd::Array1<C64> = nd::Array1::from_elem(nu - 1, sup);
    match boundary {
        Boundary::Periodic => {
            let corners = Corners { top_right: sub, bottom_left: sup };
            Tridiag::new_cyclic(sub_arr, diag, sup_arr, corners)
        },
        Boundary::HardWall => Tridiag::new(sub_arr, diag, sup_arr),
    }
}

impl Domain {
    /// Create a new `Domain`, generating the coordinate array from
    /// "linspace-style" arguments (start, inclusive end, and an array length).
    pub fn new_linspace<F>(
        xargs: (f64, f64, usize),
        V: F,
        a2: f64,
        a1: C64,
        boundary: Boundary,
    ) -> DResult<Self>
    where F: FnMut(f64) -> f64
    {
        let x: nd::Array1<f64>
            = nd::Array1::linspace(xargs.0, xargs.1, xargs.2);
        let V: nd::Array1<f64> = x.mapv(V);
        Self::new_arrays(x, V, a2, a1, boundary)
    }

    /// Create a new `Domain` from bare coordinate and potential arrays.
    ///
    /// The coordinates must be increasing and uniformly spaced.
    pub fn new_arrays(
        x: nd::Array1<f64>,
        V: nd::Array1<f64>,
        a2: f64,
        a1: C64,
        boundary: Boundary,
    ) -> DResult<Self>
    {
        let n = x.len();
        if n < 4 { return Err(DomainError::TooFewPoints(n)); }
        crate::error::LengthError::check(&x, &V)?;
        let dx = x[1] - x[0];
        let uniform
            = dx > 0.0
            && x.iter().zip(x.iter().skip(1))
                .all(|(xk, xkp1)| ((xkp1 - xk) - dx).abs() < DEF_EPSILON * dx);
        if !uniform { return Err(DomainError::BadSpacing); }
        let h = build_single_particle(dx, &V, a2, a1, boundary);
        let band = h.to_band();
        Ok(Self { x, dx, V, n, a2, a1, boundary, h, band })
    }

    /// Get a reference to the coordinate array.
    pub fn get_x(&self) -> &nd::Array1<f64> { &self.x }

    /// Get a reference to the potential array.
    pub fn get_V(&self) -> &nd::Array1<f64> { &self.V }

    /// Get the coordinate array grid spacing.
    pub fn get_dx(&self) -> f64 { self.dx }

    /// Get the second-derivative coefficient.
    pub fn get_a2(&self) -> f64 { self.a2 }

    /// Get the first-derivative coefficient.
    pub fn get_a1(&self) -> C64 { self.a1 }

    /// Get the boundary conditions.
    pub fn boundary(&self) -> Boundary { self.boundary }

    /// Get the length of the coordinate and potential arrays.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize { self.n }

    /// Number of unknown grid points (`len() - 1`).
    pub fn unknowns(&self) -> usize { self.n - 1 }

    /// Return the tridiagonal single-particle matrix over the unknown grid
    /// points, with corner couplings if the boundary is periodic.
    pub fn single_particle(&self) -> Tridiag { self.h.clone() }

    /// Apply `h` to a function sampled on the full grid.
    ///
    /// *Panics if `f` does not have length `len()`*.
    pub fn apply_h<S>(&self, f: &Arr1<S>) -> nd::Array1<C64>
    where S: nd::Data<Elem = C64>
    {
        assert_eq!(f.len(), self.n, "Domain::apply_h: bad function length");
        let nu = self.n - 1;
        let hf = self.band.matvec(&f.slice(s![..nu]));
        let mut out: nd::Array1<C64> = nd::Array1::zeros(self.n);
        out.slice_mut(s![..nu]).assign(&hf);
        out[nu] = match self.boundary {
            Boundary::Periodic => out[0],
            Boundary::HardWall => C64::zero(),
        };
        out
    }

    /// Compute the `m` lowest eigenstates of the Hermitian part of the
    /// single-particle matrix, extended to the full grid and orthonormalized
    /// under the Simpson inner product.
    ///
    /// Each state is given a global phase making its largest component real
    /// and positive.
    pub fn lowest_states(&self, m: usize) -> DResult<nd::Array2<C64>> {
        let nu = self.n - 1;
        if m > nu { return Err(DomainError::TooManyStates(m, nu)); }
        let H = self.h.to_dense();
        let herm: nd::Array2<C64>
            = nd::Zip::from(&H).and(H.t())
            .map_collect(|a, b| (a + b.conj()) * 0.5);
        let (_, evecs) = herm.eigh_into(la::UPLO::Lower)?;
        let mut orb: nd::Array2<C64> = nd::Array2::zeros((m, self.n));
        for (k, mut phi) in orb.rows_mut().into_iter().enumerate() {
            let v = evecs.column(k);
            let peak
                = v.iter()
                .fold(C64::zero(), |acc, vj| if vj.norm() > acc.norm() { *vj } else { acc });
            let phase = if peak.is_zero() { C64::from(1.0) } else { peak.conj() / peak.norm() };
            phi.slice_mut(s![..nu]).assign(&v.mapv(|vj| vj * phase));
            if self.boundary.is_periodic() { phi[nu] = phi[0]; }
        }
        orthonormalize(&mut orb, self.dx);
        Ok(orb)
    }
}
