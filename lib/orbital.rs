//! Orbital matrix elements and the nonlinear part of the orbital equations of
//! motion.
//!
//! For orbitals `φ_k` on the grid and the one-body operator `h` of a
//! [`Domain`],
//! ```text
//! Ho[k][l]         = ∫ conj(φ_k) h φ_l dx
//! Hint[k, s, q, l] = g ∫ conj(φ_k φ_s) φ_q φ_l dx
//! ```
//! The orbitals obey
//! ```text
//! i ∂φ_k/∂t = h φ_k + g NL_k - Σ_s φ_s (Ho[s][k] + Σ_{t,q,l} A[k, t, q, l] Hint[s, t, q, l])
//!
//! A[k, t, q, l] = Σ_j ρ⁻¹[k][j] ρ2[j, t, q, l]
//! NL_k(x)       = Σ_{t,q,l} A[k, t, q, l] conj(φ_t(x)) φ_q(x) φ_l(x)
//! ```
//! where the `h φ_k` term is left to the linear (Crank-Nicolson) step and
//! everything else is returned by [`orbital_rhs`].

use ndarray as nd;
use ndarray_linalg::InverseH;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use rayon::iter::{
    IntoParallelIterator,
    IntoParallelRefIterator,
    ParallelIterator,
};
use crate::{
    Arr1,
    Arr2,
    density::{ fill_orbit, one_body_density, two_body_density },
    domain::Domain,
    error::NumError,
    fock::FockSpace,
    placement::{ Family, Placement },
    utils::simps,
};

pub type NResult<T> = Result<T, NumError>;

/// Compute the one-body matrix `Ho[k][l] = ∫ conj(φ_k) h φ_l dx` for the rows
/// of `orb`.
///
/// Only the upper triangle is integrated; the lower triangle is its conjugate
/// transpose, so the result is exactly Hermitian.
pub fn one_body_matrix<S>(domain: &Domain, orb: &Arr2<S>) -> nd::Array2<C64>
where S: nd::Data<Elem = C64> + Sync
{
    let m = orb.nrows();
    let dx = domain.get_dx();
    let hphi: Vec<nd::Array1<C64>>
        = (0..m).into_par_iter()
        .map(|l| domain.apply_h(&orb.row(l)))
        .collect();
    let mut ho: nd::Array2<C64> = nd::Array2::zeros((m, m));
    for k in 0..m {
        for l in k..m {
            let integrand: nd::Array1<C64>
                = nd::Zip::from(orb.row(k)).and(&hphi[l])
                .map_collect(|p, hp| p.conj() * hp);
            let val: C64 = simps(&integrand, dx);
            if k == l {
                ho[[k, k]] = val.re.into();
            } else {
                ho[[k, l]] = val;
                ho[[l, k]] = val.conj();
            }
        }
    }
    ho
}

/// Compute the contact-interaction tensor
/// `Hint[k, s, q, l] = g ∫ conj(φ_k φ_s) φ_q φ_l dx` for the rows of `orb`.
///
/// One integral is evaluated per canonical [`Placement`]; every other entry is
/// filled by symmetry. Returns all zeros without integrating if `g == 0`.
pub fn two_body_tensor<S>(g: f64, dx: f64, orb: &Arr2<S>) -> nd::Array4<C64>
where S: nd::Data<Elem = C64> + Sync
{
    let m = orb.nrows();
    let mut hint: nd::Array4<C64> = nd::Array4::zeros((m, m, m, m));
    if g == 0.0 { return hint; }
    let placements: Vec<Placement>
        = Family::ALL.into_iter()
        .flat_map(|fam| Placement::canonical(m, fam))
        .collect();
    let vals: Vec<C64>
        = placements.par_iter()
        .map(|p| {
            let (k, s) = (p.create.lo(), p.create.hi());
            let (q, l) = (p.annihilate.lo(), p.annihilate.hi());
            let integrand: nd::Array1<C64>
                = nd::Zip::from(orb.row(k)).and(orb.row(s))
                .and(orb.row(q)).and(orb.row(l))
                .map_collect(|a, b, c, d| (a * b).conj() * c * d);
            g * simps(&integrand, dx)
        })
        .collect();
    placements.into_iter().zip(vals)
        .for_each(|(p, val)| { fill_orbit(&mut hint, p, val); });
    hint
}

/// Compute both [`one_body_matrix`] and [`two_body_tensor`] concurrently.
pub fn matrix_elements<S>(domain: &Domain, g: f64, orb: &Arr2<S>)
    -> (nd::Array2<C64>, nd::Array4<C64>)
where S: nd::Data<Elem = C64> + Sync
{
    rayon::join(
        || one_body_matrix(domain, orb),
        || two_body_tensor(g, domain.get_dx(), orb),
    )
}

// A[k, t, q, l] = Σ_j ρ⁻¹[k][j] ρ2[j, t, q, l]
fn contract_inverse(rho_inv: &nd::Array2<C64>, rho2: &nd::Array4<C64>)
    -> nd::Array4<C64>
{
    let m = rho_inv.nrows();
    nd::Array4::from_shape_fn((m, m, m, m), |(k, t, q, l)| {
        (0..m).map(|j| rho_inv[[k, j]] * rho2[[j, t, q, l]]).sum()
    })
}

// largest |a[k][l] - conj(a[l][k])|, relative to the largest |a[k][l]|
fn hermiticity_error<S>(a: &Arr2<S>) -> f64
where S: nd::Data<Elem = C64>
{
    let scale = a.iter().map(|z| z.norm()).fold(1.0, f64::max);
    a.indexed_iter()
        .map(|((k, l), akl)| (akl - a[[l, k]].conj()).norm())
        .fold(0.0, f64::max)
        / scale
}

/// Compute `∂φ/∂t` for every orbital, excluding the `-i h φ` term.
///
/// `ho` and `hint` must have been computed from `orb` (see
/// [`matrix_elements`]). When `g == 0` the two-body terms vanish identically and
/// neither density matrix is built or inverted.
///
/// *Panics if the shapes of `c`, `orb`, `ho`, or `hint` are inconsistent with
/// `space`*.
pub fn orbital_rhs<S, T, U>(
    space: &FockSpace,
    g: f64,
    c: &Arr1<S>,
    orb: &Arr2<T>,
    ho: &Arr2<U>,
    hint: &nd::Array4<C64>,
) -> NResult<nd::Array2<C64>>
where
    S: nd::Data<Elem = C64> + Sync,
    T: nd::Data<Elem = C64>,
    U: nd::Data<Elem = C64>,
{
    let m = space.norb();
    assert_eq!(c.len(), space.nc(), "orbital_rhs: bad coefficient length");
    assert_eq!(orb.nrows(), m, "orbital_rhs: bad orbital count");
    assert_eq!(ho.dim(), (m, m), "orbital_rhs: bad one-body shape");
    assert_eq!(hint.dim(), (m, m, m, m), "orbital_rhs: bad two-body shape");
    debug_assert!(
        hermiticity_error(ho) < 1e-10,
        "orbital_rhs: one-body matrix is not Hermitian",
    );
    let mut rhs: nd::Array2<C64> = nd::Array2::zeros(orb.raw_dim());
    // proj[k][s] multiplies φ_s in the projection onto the orbital space
    let mut proj: nd::Array2<C64> = ho.t().to_owned();
    if g != 0.0 {
        let (rho, rho2)
            = rayon::join(
                || one_body_density(space, c),
                || two_body_density(space, c),
            );
        debug_assert!(
            hermiticity_error(&rho) < 1e-10,
            "orbital_rhs: one-body density is not Hermitian",
        );
        let rho_inv = rho.invh().map_err(NumError::DensityInversion)?;
        let A = contract_inverse(&rho_inv, &rho2);
        for ((k, s), pks) in proj.indexed_iter_mut() {
            *pks += A.slice(nd::s![k, .., .., ..]).indexed_iter()
                .map(|((t, q, l), akt)| akt * hint[[s, t, q, l]])
                .sum::<C64>();
        }
        nd::Zip::from(rhs.columns_mut()).and(orb.columns())
            .par_for_each(|mut out, phi| {
                for (k, ok) in out.iter_mut().enumerate() {
                    let mut acc = C64::zero();
                    for ((t, q, l), akt) in A.slice(nd::s![k, .., .., ..]).indexed_iter() {
                        acc += akt * phi[t].conj() * phi[q] * phi[l];
                    }
                    *ok = g * acc;
                }
            });
    }
    rhs -= &proj.dot(orb);
    rhs.mapv_inplace(|z| -C64::i() * z);
    Ok(rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::{
        density::tests::test_coef,
        domain::Boundary,
        hamiltonian::energy,
        utils::{ orthonormalize, wf_dot },
    };

    fn test_domain() -> Domain {
        Domain::new_linspace(
            (0.0, 1.0, 65), |x| 10.0 * (x - 0.5).powi(2),
            -0.5, C64::zero(), Boundary::Periodic)
            .unwrap()
    }

    fn test_orbitals(m: usize, dom: &Domain) -> nd::Array2<C64> {
        let mut orb: nd::Array2<C64>
            = nd::Array2::from_shape_fn((m, dom.len()), |(k, j)| {
                let x = dom.get_x()[j];
                let kk = (k + 1) as f64;
                C64::new(
                    (2.0 * PI * kk * x).cos() + 0.5,
                    0.3 * (2.0 * PI * (kk + 1.0) * x).sin(),
                )
            });
        orthonormalize(&mut orb, dom.get_dx());
        orb
    }

    #[test]
    fn one_body_is_hermitian() {
        let dom = test_domain();
        let orb = test_orbitals(3, &dom);
        let ho = one_body_matrix(&dom, &orb);
        for ((k, l), h) in ho.indexed_iter() {
            assert_eq!(*h, ho[[l, k]].conj());
        }
        // the potential is positive and the kinetic operator is non-negative
        assert!(ho.diag().iter().all(|h| h.re > 0.0));
    }

    #[test]
    fn two_body_matches_direct_integral() {
        let dom = test_domain();
        let orb = test_orbitals(3, &dom);
        let g = 1.7;
        let hint = two_body_tensor(g, dom.get_dx(), &orb);
        for ((k, s, q, l), h) in hint.indexed_iter() {
            let integrand: nd::Array1<C64>
                = nd::Zip::from(orb.row(k)).and(orb.row(s))
                .and(orb.row(q)).and(orb.row(l))
                .map_collect(|a, b, c, d| (a * b).conj() * c * d);
            let direct: C64 = g * simps(&integrand, dom.get_dx());
            assert!((h - direct).norm() < 1e-12);
        }
        assert!(two_body_tensor(0.0, dom.get_dx(), &orb).iter().all(|h| h.is_zero()));
    }

    #[test]
    fn noninteracting_rhs_is_projection() {
        // with g = 0, ∂φ_k/∂t = i Σ_s φ_s Ho[s][k]
        let dom = test_domain();
        let space = FockSpace::new(3, 2).unwrap();
        let orb = test_orbitals(2, &dom);
        let (ho, hint) = matrix_elements(&dom, 0.0, &orb);
        let c = test_coef(space.nc());
        let rhs = orbital_rhs(&space, 0.0, &c, &orb, &ho, &hint).unwrap();
        for k in 0..2 {
            for j in 0..dom.len() {
                let expected: C64
                    = (0..2).map(|s| C64::i() * orb[[s, j]] * ho[[s, k]]).sum();
                assert!((rhs[[k, j]] - expected).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn interacting_rhs_stays_orthogonal() {
        // the two-body part is projected out of the orbital space, so
        // <φ_s|∂φ_k/∂t> = i Ho[s][k] when the orbitals are orthonormal
        let dom = test_domain();
        let space = FockSpace::new(3, 3).unwrap();
        let orb = test_orbitals(3, &dom);
        let g = 2.5;
        let (ho, hint) = matrix_elements(&dom, g, &orb);
        let c = test_coef(space.nc());
        let rhs = orbital_rhs(&space, g, &c, &orb, &ho, &hint).unwrap();
        for s in 0..3 {
            for k in 0..3 {
                let ovlp: C64 = wf_dot(&orb.row(s), &rhs.row(k), dom.get_dx());
                let expected = C64::i() * ho[[s, k]];
                assert!((ovlp - expected).norm() < 1e-8, "{} vs {}", ovlp, expected);
            }
        }
    }

    #[test]
    fn singular_density_is_reported() {
        // all particles in one orbital leave ρ singular
        let dom = test_domain();
        let space = FockSpace::new(2, 2).unwrap();
        let orb = test_orbitals(2, &dom);
        let (ho, hint) = matrix_elements(&dom, 1.0, &orb);
        let mut c: nd::Array1<C64> = nd::Array1::zeros(space.nc());
        c[0] = C64::from(1.0);
        let res = orbital_rhs(&space, 1.0, &c, &orb, &ho, &hint);
        assert!(matches!(res, Err(NumError::DensityInversion(_))));
    }

    #[test]
    fn density_energy_is_real() {
        let dom = test_domain();
        let space = FockSpace::new(4, 3).unwrap();
        let orb = test_orbitals(3, &dom);
        let (ho, hint) = matrix_elements(&dom, 0.8, &orb);
        let e = energy(&space, &ho, &hint, &test_coef(space.nc()));
        assert!(e.im.abs() < 1e-10);
    }

    #[test]
    fn hermiticity_error_measures_asymmetry() {
        let dom = test_domain();
        let orb = test_orbitals(3, &dom);
        let ho = one_body_matrix(&dom, &orb);
        assert_eq!(hermiticity_error(&ho), 0.0);
        let mut skewed = ho.clone();
        skewed[[0, 1]] += C64::new(0.0, 1e-3);
        assert!(hermiticity_error(&skewed) > 1e-10);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "one-body matrix is not Hermitian")]
    fn non_hermitian_one_body_matrix() {
        let dom = test_domain();
        let space = FockSpace::new(2, 2).unwrap();
        let orb = test_orbitals(2, &dom);
        let (mut ho, hint) = matrix_elements(&dom, 0.0, &orb);
        ho[[0, 1]] += C64::from(1.0);
        let c = test_coef(space.nc());
        let _ = orbital_rhs(&space, 0.0, &c, &orb, &ho, &hint);
    }
}
