//! Matrix-free action of the many-body Hamiltonian
//! ```text
//! H = Σ Ho[k][l] a†_k a_l + ½ Σ Hint[k, s, q, l] a†_k a†_s a_q a_l
//! ```
//! on a coefficient vector over the configuration basis.
//!
//! Each output element `out[i] = Σ_j <i|H|j> C[j]` is assembled independently
//! by acting with the adjoint of every operator placement on configuration `i`,
//! so no `nc × nc` matrix is ever formed.

use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use crate::{
    Arr1,
    Arr2,
    density::{ one_body_density, two_body_density },
    fock::FockSpace,
    placement::{ Hop, Placement },
};

/// A linear operator on coefficient vectors.
pub trait LinearOperator: Sync {
    /// Dimension of the vector space acted on.
    fn dim(&self) -> usize;

    /// Apply the operator to `v`.
    fn apply(&self, v: nd::ArrayView1<C64>) -> nd::Array1<C64>;
}

/// The many-body Hamiltonian for fixed one-body matrix elements `Ho` and
/// two-body integrals `Hint`.
///
/// Terms with vanishing weight are dropped at construction.
#[derive(Clone, Debug)]
pub struct ManyBodyOperator<'a> {
    space: &'a FockSpace,
    // (k, Ho[k][k])
    occupations: Vec<(usize, C64)>,
    // adjoints of off-diagonal one-body operators with their weights
    hops: Vec<(Hop, C64)>,
    // diagonal two-body placements with ½ Σ Hint over their orderings
    densities: Vec<(Placement, C64)>,
    // adjoints of off-diagonal two-body placements with their weights
    transitions: Vec<(Placement, C64)>,
}

impl<'a> ManyBodyOperator<'a> {
    /// Collect all non-zero terms of the Hamiltonian.
    ///
    /// *Panics if `ho` is not `M × M` or `hint` is not `M × M × M × M`*.
    pub fn new<S>(space: &'a FockSpace, ho: &Arr2<S>, hint: &nd::Array4<C64>)
        -> Self
    where S: nd::Data<Elem = C64>
    {
        let m = space.norb();
        assert_eq!(ho.dim(), (m, m), "ManyBodyOperator::new: bad one-body shape");
        assert_eq!(
            hint.dim(), (m, m, m, m), "ManyBodyOperator::new: bad two-body shape");
        let mut occupations: Vec<(usize, C64)> = Vec::new();
        let mut hops: Vec<(Hop, C64)> = Vec::new();
        for hop in Hop::all(m) {
            let h = ho[[hop.create, hop.annihilate]];
            if h.is_zero() { continue; }
            if hop.is_diagonal() {
                occupations.push((hop.create, h));
            } else {
                hops.push((hop.adjoint(), h));
            }
        }
        let mut densities: Vec<(Placement, C64)> = Vec::new();
        let mut transitions: Vec<(Placement, C64)> = Vec::new();
        for p in Placement::all(m) {
            let w: C64
                = 0.5 * p.orderings()
                .map(|(k, s, q, l)| hint[[k, s, q, l]])
                .sum::<C64>();
            if w.is_zero() { continue; }
            if p.is_diagonal() {
                densities.push((p, w));
            } else {
                transitions.push((p.adjoint(), w));
            }
        }
        Self { space, occupations, hops, densities, transitions }
    }

    /// Return the underlying configuration basis.
    pub fn space(&self) -> &FockSpace { self.space }

    // <i|H|C> for configuration i
    fn element<S>(&self, i: usize, c: &Arr1<S>, scratch: &mut [usize]) -> C64
    where S: nd::Data<Elem = C64>
    {
        let v = self.space.config(i);
        let mut acc = C64::zero();
        for &(k, h) in self.occupations.iter() {
            acc += h * (v[k] as f64) * c[i];
        }
        for &(hop, h) in self.hops.iter() {
            if let Some((j, f)) = hop.act(self.space, v, scratch) {
                acc += h * f * c[j];
            }
        }
        for &(p, w) in self.densities.iter() {
            acc += w * p.diagonal_factor(v) * c[i];
        }
        for &(p, w) in self.transitions.iter() {
            if let Some((j, f)) = p.act(self.space, v, scratch) {
                acc += w * f * c[j];
            }
        }
        acc
    }

    /// Compute `H C`.
    ///
    /// *Panics if `c` does not have length `nc`*.
    pub fn apply_to<S>(&self, c: &Arr1<S>) -> nd::Array1<C64>
    where S: nd::Data<Elem = C64> + Sync
    {
        assert_eq!(c.len(), self.space.nc(), "ManyBodyOperator: bad vector length");
        let out: Vec<C64>
            = (0..self.space.nc()).into_par_iter()
            .map_init(
                || vec![0_usize; self.space.norb()],
                |scratch, i| self.element(i, c, scratch.as_mut_slice()),
            )
            .collect();
        nd::Array1::from(out)
    }

    /// Compute the expectation value `<C|H|C>`.
    pub fn expectation<S>(&self, c: &Arr1<S>) -> C64
    where S: nd::Data<Elem = C64> + Sync
    {
        let hc = self.apply_to(c);
        c.iter().zip(hc.iter()).map(|(ci, hci)| ci.conj() * hci).sum()
    }
}

impl<'a> LinearOperator for ManyBodyOperator<'a> {
    fn dim(&self) -> usize { self.space.nc() }

    fn apply(&self, v: nd::ArrayView1<C64>) -> nd::Array1<C64> {
        self.apply_to(&v)
    }
}

/// Compute the energy `Σ Ho[k][l] ρ[k][l] + ½ Σ Hint[k, s, q, l] ρ2[k, s, q,
/// l]` from the reduced density matrices of `c`.
pub fn energy<S, T>(
    space: &FockSpace,
    ho: &Arr2<S>,
    hint: &nd::Array4<C64>,
    c: &Arr1<T>,
) -> C64
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64> + Sync,
{
    let rho = one_body_density(space, c);
    let rho2 = two_body_density(space, c);
    energy_from_densities(ho, hint, &rho, &rho2)
}

/// Like [`energy`], but from precomputed density matrices.
pub fn energy_from_densities<S>(
    ho: &Arr2<S>,
    hint: &nd::Array4<C64>,
    rho: &nd::Array2<C64>,
    rho2: &nd::Array4<C64>,
) -> C64
where S: nd::Data<Elem = C64>
{
    let e1: C64 = nd::Zip::from(ho).and(rho)
        .fold(C64::zero(), |acc, h, r| acc + h * r);
    let e2: C64 = nd::Zip::from(hint).and(rho2)
        .fold(C64::zero(), |acc, h, r| acc + h * r);
    e1 + 0.5 * e2
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::density::{ fill_orbit, tests::test_coef };
    use crate::placement::Family;

    // Hermitian one-body matrix with distinct entries
    pub(crate) fn test_ho(m: usize) -> nd::Array2<C64> {
        let mut ho: nd::Array2<C64> = nd::Array2::zeros((m, m));
        for k in 0..m {
            ho[[k, k]] = C64::from(1.0 + k as f64);
            for l in k + 1..m {
                let z = C64::new(0.3 * (k + 2 * l) as f64, -0.2 * (l - k) as f64);
                ho[[k, l]] = z;
                ho[[l, k]] = z.conj();
            }
        }
        ho
    }

    // two-body tensor with the symmetries of a contact-interaction integral
    pub(crate) fn test_hint(m: usize) -> nd::Array4<C64> {
        let mut hint: nd::Array4<C64> = nd::Array4::zeros((m, m, m, m));
        let mut x: f64 = 0.0;
        for fam in Family::ALL {
            for p in Placement::canonical(m, fam) {
                x += 1.0;
                fill_orbit(&mut hint, p, C64::new((0.9 * x).cos(), (0.4 * x).sin()));
            }
        }
        hint
    }

    #[test]
    fn zero_operator() {
        let space = FockSpace::new(3, 3).unwrap();
        let ho: nd::Array2<C64> = nd::Array2::zeros((3, 3));
        let hint: nd::Array4<C64> = nd::Array4::zeros((3, 3, 3, 3));
        let op = ManyBodyOperator::new(&space, &ho, &hint);
        let out = op.apply_to(&test_coef(space.nc()));
        assert!(out.iter().all(|o| *o == C64::zero()));
    }

    #[test]
    fn identity_counts_particles() {
        let (n, m) = (4, 3);
        let space = FockSpace::new(n, m).unwrap();
        let ho: nd::Array2<C64> = nd::Array2::eye(m);
        let hint: nd::Array4<C64> = nd::Array4::zeros((m, m, m, m));
        let op = ManyBodyOperator::new(&space, &ho, &hint);
        let c = test_coef(space.nc());
        let out = op.apply_to(&c);
        for (o, ci) in out.iter().zip(c.iter()) {
            assert!((*o - *ci * n as f64).norm() < 1e-13);
        }
    }

    #[test]
    fn expectation_matches_density_energy() {
        for &(n, m) in &[(2, 2), (3, 3), (4, 3), (2, 4)] {
            let space = FockSpace::new(n, m).unwrap();
            let ho = test_ho(m);
            let hint = test_hint(m);
            let c = test_coef(space.nc());
            let op = ManyBodyOperator::new(&space, &ho, &hint);
            let e_op = op.expectation(&c);
            let e_rho = energy(&space, &ho, &hint, &c);
            assert!((e_op - e_rho).norm() < 1e-11, "{} vs {}", e_op, e_rho);
            assert!(e_op.im.abs() < 1e-11);
        }
    }

    #[test]
    fn operator_is_hermitian() {
        let space = FockSpace::new(3, 4).unwrap();
        let op = ManyBodyOperator::new(&space, &test_ho(4), &test_hint(4));
        let nc = space.nc();
        let u = test_coef(nc);
        let w: nd::Array1<C64>
            = (0..nc).map(|i| C64::new((i as f64).cos(), 0.5)).collect();
        let uhw: C64 = u.iter().zip(op.apply_to(&w).iter())
            .map(|(a, b)| a.conj() * b).sum();
        let whu: C64 = w.iter().zip(op.apply_to(&u).iter())
            .map(|(a, b)| a.conj() * b).sum();
        assert!((uhw - whu.conj()).norm() < 1e-11);
    }
}
