//! Placements of creation and annihilation operators on orbital indices.
//!
//! Both the density matrices and the many-body Hamiltonian are sums over
//! operator strings `a†_k a_l` (one-body) and `a†_k a†_s a_q a_l` (two-body).
//! Because bosonic operators of the same kind commute, a two-body string is
//! determined by an unordered pair of creation indices and an unordered pair of
//! annihilation indices, which is what [`Placement`] stores. All the ordered
//! index tuples it stands for share one matrix element; [`Placement::orderings`]
//! and [`Placement::adjoint`] give the tuples an element must be copied to.
//!
//! Placements fall into nine [`Family`]s according to which of their indices
//! coincide. Members of the two diagonal families leave every configuration
//! unchanged and are evaluated from occupation numbers alone.

use crate::fock::FockSpace;

/// A one-body operator `a†_create a_annihilate`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Hop {
    pub create: usize,
    pub annihilate: usize,
}

impl Hop {
    /// Return `true` if the operator is an occupation number.
    pub fn is_diagonal(&self) -> bool { self.create == self.annihilate }

    /// Swap creation and annihilation indices.
    pub fn adjoint(&self) -> Self {
        Self { create: self.annihilate, annihilate: self.create }
    }

    /// Act on the configuration `src`, returning the target index and matrix
    /// element factor. See [`FockSpace::apply_string`].
    pub fn act(&self, space: &FockSpace, src: &[usize], scratch: &mut [usize])
        -> Option<(usize, f64)>
    {
        space.apply_string(src, scratch, &[self.annihilate], &[self.create])
    }

    /// All `M²` one-body operators.
    pub fn all(norb: usize) -> impl Iterator<Item = Self> {
        (0..norb).flat_map(move |k| {
            (0..norb).map(move |l| Self { create: k, annihilate: l })
        })
    }
}

/// An unordered pair of orbital indices, stored with `.0 <= .1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair(usize, usize);

impl Pair {
    /// Create a new pair, sorting the indices.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// Smaller index.
    pub fn lo(&self) -> usize { self.0 }

    /// Larger index.
    pub fn hi(&self) -> usize { self.1 }

    /// Return `true` if both indices are the same.
    pub fn is_double(&self) -> bool { self.0 == self.1 }

    /// Return `true` if `k` is one of the indices.
    pub fn contains(&self, k: usize) -> bool { self.0 == k || self.1 == k }

    /// The distinct orderings of the pair: one if the indices coincide, two
    /// otherwise.
    pub fn orderings(&self) -> impl Iterator<Item = (usize, usize)> {
        let Self(a, b) = *self;
        std::iter::once((a, b))
            .chain((a != b).then_some((b, a)))
    }

    /// All `M (M + 1) / 2` unordered pairs in lexicographic order.
    pub fn all(norb: usize) -> impl Iterator<Item = Self> {
        (0..norb).flat_map(move |a| (a..norb).map(move |b| Self(a, b)))
    }

    fn as_array(&self) -> [usize; 2] { [self.0, self.1] }
}

/// Selection-rule families of two-body placements, labelled by the pattern of
/// coinciding indices in `a†_k a†_s a_q a_l`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// `kk|kk`
    OnSite,
    /// `ks|ks`
    CrossDensity,
    /// `kk|qq`
    PairExchange,
    /// `kk|kl`
    CollectHop,
    /// `ks|ss`
    ReleaseHop,
    /// `kk|ql`
    PairMerge,
    /// `ks|qq`
    PairSplit,
    /// `ks|sl`
    AssistedHop,
    /// `ks|ql`
    Scatter,
}

impl Family {
    /// All nine families.
    pub const ALL: [Self; 9] = [
        Self::OnSite,
        Self::CrossDensity,
        Self::PairExchange,
        Self::CollectHop,
        Self::ReleaseHop,
        Self::PairMerge,
        Self::PairSplit,
        Self::AssistedHop,
        Self::Scatter,
    ];

    /// Return `true` if members of the family act diagonally on every
    /// configuration.
    pub fn is_diagonal(&self) -> bool {
        matches!(self, Self::OnSite | Self::CrossDensity)
    }

    /// Number of distinct orbital indices involved.
    pub fn distinct(&self) -> usize {
        match self {
            Self::OnSite => 1,
            Self::CrossDensity | Self::PairExchange | Self::CollectHop
                | Self::ReleaseHop => 2,
            Self::PairMerge | Self::PairSplit | Self::AssistedHop => 3,
            Self::Scatter => 4,
        }
    }
}

/// A two-body operator `a†_k a†_s a_q a_l` with `create = {k, s}` and
/// `annihilate = {q, l}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placement {
    pub create: Pair,
    pub annihilate: Pair,
}

impl Placement {
    /// Create a new placement from the index tuple `(k, s, q, l)` of
    /// `a†_k a†_s a_q a_l`.
    pub fn new(k: usize, s: usize, q: usize, l: usize) -> Self {
        Self { create: Pair::new(k, s), annihilate: Pair::new(q, l) }
    }

    /// Classify the placement by its pattern of coinciding indices.
    pub fn family(&self) -> Family {
        let c = self.create;
        let a = self.annihilate;
        match (c.is_double(), a.is_double()) {
            (true, true) if c == a => Family::OnSite,
            (true, true) => Family::PairExchange,
            (true, false) if a.contains(c.lo()) => Family::CollectHop,
            (true, false) => Family::PairMerge,
            (false, true) if c.contains(a.lo()) => Family::ReleaseHop,
            (false, true) => Family::PairSplit,
            (false, false) => {
                let shared = c.as_array().into_iter()
                    .filter(|k| a.contains(*k))
                    .count();
                match shared {
                    2 => Family::CrossDensity,
                    1 => Family::AssistedHop,
                    _ => Family::Scatter,
                }
            },
        }
    }

    /// Return `true` if the placement acts diagonally on every configuration.
    pub fn is_diagonal(&self) -> bool { self.create == self.annihilate }

    /// Swap creation and annihilation pairs.
    pub fn adjoint(&self) -> Self {
        Self { create: self.annihilate, annihilate: self.create }
    }

    /// Return `true` if the placement is its own adjoint.
    pub fn is_self_adjoint(&self) -> bool { self.is_diagonal() }

    /// Return `true` if the placement is the canonical member of the
    /// `{self, self.adjoint()}` pair.
    pub fn is_canonical(&self) -> bool { self.create <= self.annihilate }

    /// All distinct ordered tuples `(k, s, q, l)` represented by the placement.
    pub fn orderings(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> {
        let annihilate = self.annihilate;
        self.create.orderings()
            .flat_map(move |(k, s)| {
                annihilate.orderings().map(move |(q, l)| (k, s, q, l))
            })
    }

    /// Diagonal matrix element `<v| a†_k a†_s a_q a_l |v>` for a diagonal
    /// placement.
    ///
    /// *Panics in debug builds if the placement is not diagonal*.
    pub fn diagonal_factor(&self, v: &[usize]) -> f64 {
        debug_assert!(self.is_diagonal());
        let Pair(k, s) = self.create;
        if k == s {
            let nk = v[k] as f64;
            nk * (nk - 1.0)
        } else {
            v[k] as f64 * v[s] as f64
        }
    }

    /// Act on the configuration `src`, returning the target index and matrix
    /// element factor. See [`FockSpace::apply_string`].
    pub fn act(&self, space: &FockSpace, src: &[usize], scratch: &mut [usize])
        -> Option<(usize, f64)>
    {
        space.apply_string(
            src, scratch, &self.annihilate.as_array(), &self.create.as_array())
    }

    /// All placements on `norb` orbitals.
    pub fn all(norb: usize) -> impl Iterator<Item = Self> {
        Pair::all(norb).flat_map(move |create| {
            Pair::all(norb).map(move |annihilate| Self { create, annihilate })
        })
    }

    /// All canonical placements on `norb` orbitals belonging to `family`.
    pub fn canonical(norb: usize, family: Family) -> Vec<Self> {
        Self::all(norb)
            .filter(|p| p.is_canonical() && p.family() == family)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(Placement::new(0, 0, 0, 0).family(), Family::OnSite);
        assert_eq!(Placement::new(0, 1, 1, 0).family(), Family::CrossDensity);
        assert_eq!(Placement::new(1, 1, 2, 2).family(), Family::PairExchange);
        assert_eq!(Placement::new(1, 1, 2, 1).family(), Family::CollectHop);
        assert_eq!(Placement::new(2, 0, 0, 0).family(), Family::ReleaseHop);
        assert_eq!(Placement::new(0, 0, 1, 2).family(), Family::PairMerge);
        assert_eq!(Placement::new(1, 2, 0, 0).family(), Family::PairSplit);
        assert_eq!(Placement::new(0, 1, 2, 1).family(), Family::AssistedHop);
        assert_eq!(Placement::new(0, 1, 2, 3).family(), Family::Scatter);
        for p in Placement::all(4) {
            let adj = p.adjoint().family();
            let expected = match p.family() {
                Family::CollectHop => Family::ReleaseHop,
                Family::ReleaseHop => Family::CollectHop,
                Family::PairMerge => Family::PairSplit,
                Family::PairSplit => Family::PairMerge,
                fam => fam,
            };
            assert_eq!(adj, expected);
        }
    }

    #[test]
    fn every_tuple_is_covered_once() {
        let m: usize = 3;
        let mut hits = vec![0_usize; m.pow(4)];
        for p in Placement::all(m) {
            for (k, s, q, l) in p.orderings() {
                hits[k + s * m + q * m * m + l * m * m * m] += 1;
            }
        }
        assert!(hits.into_iter().all(|h| h == 1));
    }

    #[test]
    fn canonical_orbits_cover_all_placements() {
        let m = 4;
        let ncanon: usize = Family::ALL.iter()
            .map(|fam| Placement::canonical(m, *fam).len())
            .sum();
        let npairs = m * (m + 1) / 2;
        assert_eq!(ncanon, npairs * (npairs + 1) / 2);
        for fam in Family::ALL {
            for p in Placement::canonical(m, fam) {
                let d = [p.create.lo(), p.create.hi(), p.annihilate.lo(), p.annihilate.hi()];
                let mut d = d.to_vec();
                d.sort_unstable();
                d.dedup();
                assert_eq!(d.len(), fam.distinct());
            }
        }
    }

    #[test]
    fn diagonal_factors_match_action() {
        let space = FockSpace::new(4, 3).unwrap();
        let mut scratch = vec![0; 3];
        for p in Placement::all(3).filter(|p| p.is_diagonal()) {
            assert!(p.family().is_diagonal());
            for idx in 0..space.nc() {
                let v = space.config(idx);
                let f = p.diagonal_factor(v);
                match p.act(&space, v, &mut scratch) {
                    Some((j, g)) => {
                        assert_eq!(j, idx);
                        assert!((f - g).abs() < 1e-12);
                    },
                    None => assert_eq!(f, 0.0),
                }
            }
        }
    }
}
