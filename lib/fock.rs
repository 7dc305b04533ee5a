//! Combinatorial indexing of bosonic occupation-number configurations.
//!
//! A configuration of `N` particles in `M` orbitals is an occupation vector
//! `v` of length `M` with `Σ v = N`. There are `nc = C(N + M - 1, M - 1)` such
//! vectors, each mapped to a dense index `0 ≤ idx < nc`. Index 0 is the
//! configuration with all particles in the first orbital, and the last index
//! has all particles in the last orbital.
//!
//! ```
//! use mctdhb::fock::FockSpace;
//!
//! let space = FockSpace::new(2, 2).unwrap();
//! assert_eq!(space.nc(), 3);
//! assert_eq!(space.config(0), &[2, 0]);
//! assert_eq!(space.config(1), &[1, 1]);
//! assert_eq!(space.config(2), &[0, 2]);
//! assert_eq!(space.config_to_index(&[1, 1]), 1);
//! ```

use ndarray as nd;
use crate::error::FockError;

pub type FResult<T> = Result<T, FockError>;

/// Number of ways to distribute `n` bosons among `m` orbitals, `C(n + m - 1, m
/// - 1)`, or `None` if the result overflows.
///
/// By convention, zero orbitals admit zero configurations.
pub fn checked_count(n: usize, m: usize) -> Option<usize> {
    if m == 0 { return Some(0); }
    // C(n + i, i) = C(n + i - 1, i - 1) (n + i) / i is exact at every stage
    (1..m).try_fold(1_usize, |acc, i| {
        acc.checked_mul(n + i).map(|p| p / i)
    })
}

/// Number of ways to distribute `n` bosons among `m` orbitals.
///
/// *Panics if the result overflows a `usize`*.
pub fn count(n: usize, m: usize) -> usize {
    checked_count(n, m)
        .unwrap_or_else(|| panic!("count: C({} + {} - 1, {} - 1) overflows", n, m, m))
}

/// The configuration basis for a fixed number of particles and orbitals.
///
/// Built once per `(N, M)` pair and immutable thereafter; shared by reference
/// with everything that needs to map between configurations and indices.
#[derive(Clone, Debug)]
pub struct FockSpace {
    npar: usize,
    norb: usize,
    nc: usize,
    // counts[[n, m]] = count(n, m) for n ≤ npar, m ≤ norb
    counts: nd::Array2<usize>,
    // row-major table of all configurations, `norb` entries per index
    table: Vec<usize>,
}

impl FockSpace {
    /// Build the count table and configuration table for `npar` particles in
    /// `norb` orbitals.
    pub fn new(npar: usize, norb: usize) -> FResult<Self> {
        if norb == 0 { return Err(FockError::NoOrbitals); }
        let nc = checked_count(npar, norb)
            .ok_or(FockError::Overflow(npar, norb))?;
        let mut counts: nd::Array2<usize>
            = nd::Array2::zeros((npar + 1, norb + 1));
        for ((n, m), c) in counts.indexed_iter_mut() {
            // entries are bounded by `nc`, which did not overflow
            *c = checked_count(n, m).ok_or(FockError::Overflow(n, m))?;
        }
        let mut space = Self { npar, norb, nc, counts, table: Vec::new() };
        let mut table: Vec<usize> = Vec::with_capacity(nc * norb);
        let mut v: Vec<usize> = vec![0; norb];
        for idx in 0..nc {
            space.peel(idx, &mut v);
            table.extend_from_slice(&v);
        }
        space.table = table;
        Ok(space)
    }

    /// Number of particles.
    pub fn npar(&self) -> usize { self.npar }

    /// Number of orbitals.
    pub fn norb(&self) -> usize { self.norb }

    /// Number of configurations.
    pub fn nc(&self) -> usize { self.nc }

    /// Look up an entry of the count table.
    ///
    /// *Panics if `n > npar` or `m > norb`*.
    pub fn count(&self, n: usize, m: usize) -> usize { self.counts[[n, m]] }

    // write the configuration with index `idx` into `v` by peeling particles
    // off the highest orbital whose count still fits in the remaining index
    fn peel(&self, idx: usize, v: &mut [usize]) {
        v.iter_mut().for_each(|vk| { *vk = 0; });
        let mut k = idx;
        let mut n = self.npar;
        let mut m = self.norb - 1;
        while k > 0 {
            while k < self.counts[[n, m]] { m -= 1; }
            while k >= self.counts[[n, m]] {
                k -= self.counts[[n, m]];
                v[m] += 1;
                n -= 1;
            }
        }
        v[0] += n;
    }

    /// Compute the configuration with index `idx`.
    ///
    /// *Panics if `idx ≥ nc`*.
    pub fn index_to_config(&self, idx: usize) -> Vec<usize> {
        assert!(idx < self.nc, "index_to_config: index {} out of range", idx);
        let mut v: Vec<usize> = vec![0; self.norb];
        self.peel(idx, &mut v);
        v
    }

    /// Borrow the precomputed configuration with index `idx`.
    ///
    /// *Panics if `idx ≥ nc`*.
    pub fn config(&self, idx: usize) -> &[usize] {
        &self.table[idx * self.norb..(idx + 1) * self.norb]
    }

    /// Compute the index of the configuration `v`.
    ///
    /// *Panics if `v` does not hold exactly `npar` particles in `norb`
    /// orbitals*.
    pub fn config_to_index(&self, v: &[usize]) -> usize {
        assert_eq!(v.len(), self.norb, "config_to_index: wrong number of orbitals");
        let mut n: usize = v.iter().sum();
        assert_eq!(n, self.npar, "config_to_index: wrong number of particles");
        let mut k: usize = 0;
        for (m, vm) in v.iter().enumerate().skip(1).rev() {
            for _ in 0..*vm {
                k += self.counts[[n, m]];
                n -= 1;
            }
        }
        debug_assert!(k < self.nc);
        k
    }

    /// Apply the operator string `a†_{create[..]} a_{annihilate[..]}` to the
    /// configuration `src`, annihilating first, and return the index of the
    /// resulting configuration and the bosonic matrix-element factor.
    ///
    /// The resulting configuration is left in `scratch`, which must have length
    /// `norb`. Returns `None` if an annihilation acts on an empty orbital.
    pub fn apply_string(
        &self,
        src: &[usize],
        scratch: &mut [usize],
        annihilate: &[usize],
        create: &[usize],
    ) -> Option<(usize, f64)>
    {
        scratch.copy_from_slice(src);
        let mut f2: f64 = 1.0;
        for &l in annihilate {
            if scratch[l] == 0 { return None; }
            f2 *= scratch[l] as f64;
            scratch[l] -= 1;
        }
        for &k in create {
            scratch[k] += 1;
            f2 *= scratch[k] as f64;
        }
        Some((self.config_to_index(scratch), f2.sqrt()))
    }
}
