//! Observables derived from the one-body density matrix.
//!
//! Diagonalizing `ρ = U diag(n) U†` gives the natural occupations `n_j` and
//! natural orbitals `χ_j = Σ_l conj(U[l][j]) φ_l`, in terms of which the
//! spatial one-body density matrix is
//! ```text
//! ρ(x, x') = Σ_j n_j χ_j(x) conj(χ_j(x'))
//! ```

use ndarray as nd;
use ndarray_linalg::{ self as la, EighInto };
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    Arr2,
    error::NumError,
};

pub type NResult<T> = Result<T, NumError>;

/// Natural occupations and orbitals, sorted by decreasing occupation.
#[derive(Clone, Debug)]
pub struct NaturalOrbitals {
    /// Eigenvalues of the one-body density matrix.
    pub occupations: nd::Array1<f64>,
    /// One natural orbital per row.
    pub orbitals: nd::Array2<C64>,
}

impl NaturalOrbitals {
    /// Total particle number `Σ n_j`.
    pub fn npar(&self) -> f64 { self.occupations.sum() }
}

/// Diagonalize the one-body density matrix `rho` of a state with orbitals
/// `orb` (one per row).
///
/// *Panics if `rho` is not `M × M` for `M` orbitals*.
pub fn natural_orbitals<S, T>(rho: &Arr2<S>, orb: &Arr2<T>)
    -> NResult<NaturalOrbitals>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    let m = orb.nrows();
    assert_eq!(rho.dim(), (m, m), "natural_orbitals: bad density shape");
    let (occ, U): (nd::Array1<f64>, nd::Array2<C64>)
        = rho.to_owned().eigh_into(la::UPLO::Lower)
        .map_err(NumError::DensityEigh)?;
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| occ[b].total_cmp(&occ[a]));
    let occupations: nd::Array1<f64> = order.iter().map(|&j| occ[j]).collect();
    let Uh: nd::Array2<C64> = U.t().mapv(|u| u.conj());
    let mut orbitals: nd::Array2<C64> = nd::Array2::zeros(orb.raw_dim());
    for (mut chi, &j) in orbitals.rows_mut().into_iter().zip(order.iter()) {
        chi.assign(&Uh.row(j).dot(orb));
    }
    Ok(NaturalOrbitals { occupations, orbitals })
}

/// Compute the von Neumann entropy `-Σ_j (n_j / N) ln(n_j / N)` of natural
/// occupations. Vanishing occupations contribute nothing.
pub fn von_neumann_entropy<S>(occ: &Arr1<S>, npar: usize) -> f64
where S: nd::Data<Elem = f64>
{
    let n = npar as f64;
    occ.iter()
        .map(|nj| nj / n)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

/// Fraction of particles in the most occupied natural orbital.
pub fn condensate_fraction<S>(occ: &Arr1<S>, npar: usize) -> f64
where S: nd::Data<Elem = f64>
{
    occ.iter().copied().fold(f64::NEG_INFINITY, f64::max) / npar as f64
}

/// Compute the single-particle spatial density `Σ_j n_j |χ_j(x)|² / N`,
/// normalized to unit integral.
pub fn spatial_density(natural: &NaturalOrbitals) -> nd::Array1<f64> {
    let n = natural.npar();
    let mut dens: nd::Array1<f64> = nd::Array1::zeros(natural.orbitals.ncols());
    for (chi, nj) in natural.orbitals.rows().into_iter()
        .zip(natural.occupations.iter())
    {
        nd::Zip::from(&mut dens).and(&chi)
            .for_each(|d, c| { *d += nj * c.norm_sqr() / n; });
    }
    dens
}

/// Compute the spatial one-body density matrix
/// `Σ_j n_j χ_j(x) conj(χ_j(x')) / N` on the grid.
pub fn spatial_density_matrix(natural: &NaturalOrbitals) -> nd::Array2<C64> {
    let n = natural.npar();
    let npts = natural.orbitals.ncols();
    let mut dm: nd::Array2<C64> = nd::Array2::zeros((npts, npts));
    for (chi, nj) in natural.orbitals.rows().into_iter()
        .zip(natural.occupations.iter())
    {
        let w = nj / n;
        for ((x, xp), d) in dm.indexed_iter_mut() {
            *d += w * chi[x] * chi[xp].conj();
        }
    }
    dm
}
