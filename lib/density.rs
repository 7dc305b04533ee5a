//! One- and two-body reduced density matrices.
//!
//! With the coefficient vector `C` over the configuration basis,
//! ```text
//! ρ[k][l]       = <a†_k a_l>
//! ρ2[k, s, q, l] = <a†_k a†_s a_q a_l>
//! ```
//! Only one member of each `{placement, adjoint}` pair is evaluated; every
//! other entry is copied from it by permutation and conjugation symmetry.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use crate::{
    Arr1,
    fock::FockSpace,
    placement::{ Family, Hop, Placement },
};

// Σ_j conj(C_i) C_j f over all configurations j reachable by `act`, where
// `act` maps j to (i, f)
fn transition_sum<S, F>(space: &FockSpace, c: &Arr1<S>, act: F) -> C64
where
    S: nd::Data<Elem = C64> + Sync,
    F: Fn(&[usize], &mut [usize]) -> Option<(usize, f64)> + Sync,
{
    (0..space.nc()).into_par_iter()
        .map_init(
            || vec![0_usize; space.norb()],
            |scratch, j| {
                act(space.config(j), scratch.as_mut_slice())
                    .map(|(i, f)| c[i].conj() * c[j] * f)
                    .unwrap_or_else(|| C64::from(0.0))
            },
        )
        .sum()
}

// Σ_j |C_j|² w(v_j)
fn diagonal_sum<S, F>(space: &FockSpace, c: &Arr1<S>, w: F) -> f64
where
    S: nd::Data<Elem = C64> + Sync,
    F: Fn(&[usize]) -> f64 + Sync,
{
    (0..space.nc()).into_par_iter()
        .map(|j| c[j].norm_sqr() * w(space.config(j)))
        .sum()
}

/// Compute the expectation value `<a†_k a_l>` of a one-body operator.
pub fn hop_expectation<S>(space: &FockSpace, c: &Arr1<S>, hop: Hop) -> C64
where S: nd::Data<Elem = C64> + Sync
{
    if hop.is_diagonal() {
        let k = hop.create;
        diagonal_sum(space, c, |v| v[k] as f64).into()
    } else {
        transition_sum(space, c, |v, scratch| hop.act(space, v, scratch))
    }
}

/// Compute the expectation value `<a†_k a†_s a_q a_l>` of a two-body operator.
pub fn placement_expectation<S>(space: &FockSpace, c: &Arr1<S>, p: Placement)
    -> C64
where S: nd::Data<Elem = C64> + Sync
{
    if p.is_diagonal() {
        diagonal_sum(space, c, |v| p.diagonal_factor(v)).into()
    } else {
        transition_sum(space, c, |v, scratch| p.act(space, v, scratch))
    }
}

/// Write `val` into every entry of `t` represented by `p`, and its conjugate
/// into every entry represented by `p.adjoint()`.
///
/// Values of self-adjoint placements are taken to be real.
pub fn fill_orbit(t: &mut nd::Array4<C64>, p: Placement, val: C64) {
    if p.is_self_adjoint() {
        let val = C64::from(val.re);
        p.orderings().for_each(|(k, s, q, l)| { t[[k, s, q, l]] = val; });
    } else {
        p.orderings().for_each(|(k, s, q, l)| { t[[k, s, q, l]] = val; });
        p.adjoint().orderings()
            .for_each(|(k, s, q, l)| { t[[k, s, q, l]] = val.conj(); });
    }
}

/// Compute the one-body density matrix `ρ[k][l] = <a†_k a_l>`.
///
/// The upper triangle is computed and the lower triangle filled by Hermitian
/// conjugation.
pub fn one_body_density<S>(space: &FockSpace, c: &Arr1<S>) -> nd::Array2<C64>
where S: nd::Data<Elem = C64> + Sync
{
    let m = space.norb();
    let mut rho: nd::Array2<C64> = nd::Array2::zeros((m, m));
    for k in 0..m {
        for l in k..m {
            let val = hop_expectation(space, c, Hop { create: k, annihilate: l });
            rho[[k, l]] = val;
            rho[[l, k]] = val.conj();
        }
    }
    rho
}

/// Compute the two-body density tensor `ρ2[k, s, q, l] = <a†_k a†_s a_q a_l>`.
///
/// Each selection-rule [`Family`] is handled in its own pass over its
/// canonical placements.
pub fn two_body_density<S>(space: &FockSpace, c: &Arr1<S>) -> nd::Array4<C64>
where S: nd::Data<Elem = C64> + Sync
{
    let m = space.norb();
    let mut rho2: nd::Array4<C64> = nd::Array4::zeros((m, m, m, m));
    for family in Family::ALL {
        let placements = Placement::canonical(m, family);
        log::trace!(
            "two_body_density: {:?}: {} placements", family, placements.len());
        for p in placements {
            let val = placement_expectation(space, c, p);
            fill_orbit(&mut rho2, p, val);
        }
    }
    rho2
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::normalize_coef;

    // deterministic, normalized, non-trivially complex coefficients
    pub(crate) fn test_coef(nc: usize) -> nd::Array1<C64> {
        let mut c: nd::Array1<C64>
            = (0..nc)
            .map(|i| {
                let x = i as f64 + 1.0;
                C64::new((1.3 * x).sin() + 0.2, (0.7 * x).cos() * 0.5)
            })
            .collect();
        normalize_coef(&mut c);
        c
    }

    #[test]
    fn one_body_hermitian_with_trace_n() {
        for &(n, m) in &[(2, 2), (3, 3), (4, 2), (3, 4)] {
            let space = FockSpace::new(n, m).unwrap();
            let c = test_coef(space.nc());
            let rho = one_body_density(&space, &c);
            let tr: C64 = rho.diag().sum();
            assert!((tr - n as f64).norm() < 1e-12);
            for k in 0..m {
                for l in 0..m {
                    assert!((rho[[k, l]] - rho[[l, k]].conj()).norm() < 1e-14);
                }
            }
        }
    }

    #[test]
    fn two_body_symmetries() {
        let space = FockSpace::new(3, 3).unwrap();
        let c = test_coef(space.nc());
        let rho2 = two_body_density(&space, &c);
        for ((k, s, q, l), r) in rho2.indexed_iter() {
            assert!((r - rho2[[s, k, q, l]]).norm() < 1e-14);
            assert!((r - rho2[[k, s, l, q]]).norm() < 1e-14);
            assert!((r - rho2[[q, l, k, s]].conj()).norm() < 1e-14);
        }
    }

    #[test]
    fn two_body_contracts_to_one_body() {
        // Σ_s <a†_k a†_s a_s a_q> = (N - 1) <a†_k a_q>
        for &(n, m) in &[(2, 2), (3, 3), (4, 3)] {
            let space = FockSpace::new(n, m).unwrap();
            let c = test_coef(space.nc());
            let rho = one_body_density(&space, &c);
            let rho2 = two_body_density(&space, &c);
            for k in 0..m {
                for q in 0..m {
                    let contr: C64 = (0..m).map(|s| rho2[[k, s, s, q]]).sum();
                    let expected = rho[[k, q]] * (n as f64 - 1.0);
                    assert!((contr - expected).norm() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn condensed_state() {
        // all particles in orbital 0
        let space = FockSpace::new(4, 3).unwrap();
        let mut c: nd::Array1<C64> = nd::Array1::zeros(space.nc());
        c[0] = C64::from(1.0);
        let rho = one_body_density(&space, &c);
        assert!((rho[[0, 0]] - 4.0).norm() < 1e-15);
        assert!(rho.iter().skip(1).all(|r| r.norm() < 1e-15));
        let rho2 = two_body_density(&space, &c);
        assert!((rho2[[0, 0, 0, 0]] - 12.0).norm() < 1e-15);
    }
}
