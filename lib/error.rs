//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use std::{ io, path::PathBuf };
use ndarray as nd;
use ndarray_linalg::error::LinalgError;
use thiserror::Error;
use crate::timedep::Stage;

/// Returned when an operation requiring equal-length arrays encounters arrays
/// with unequal length.
#[derive(Debug, Error)]
#[error("encountered arrays with incompatible lengths; got {0} and {1}")]
pub struct LengthError(pub usize, pub usize);

impl LengthError {
    pub(crate) fn check<S, A, T, B>(
        a: &nd::ArrayBase<S, nd::Ix1>,
        b: &nd::ArrayBase<T, nd::Ix1>,
    ) -> Result<(), Self>
    where
        S: nd::Data<Elem = A>,
        T: nd::Data<Elem = B>,
    {
        let na = a.len();
        let nb = b.len();
        (na == nb).then_some(()).ok_or(Self(na, nb))
    }

    pub(crate) fn check_len(expected: usize, got: usize) -> Result<(), Self> {
        (expected == got).then_some(()).ok_or(Self(expected, got))
    }
}

/// Returned from the construction of a [`FockSpace`][crate::fock::FockSpace].
#[derive(Debug, Error)]
pub enum FockError {
    /// Returned when zero orbitals are requested.
    #[error("number of orbitals must be at least 1")]
    NoOrbitals,

    /// Returned when the number of configurations does not fit in a `usize`.
    #[error("configuration count for {0} particles in {1} orbitals overflows")]
    Overflow(usize, usize),
}

/// Returned from the construction of a [`Domain`][crate::domain::Domain].
#[derive(Debug, Error)]
pub enum DomainError {
    /// Returned when the grid has fewer than 4 points.
    #[error("spatial grid must have at least 4 points; got {0}")]
    TooFewPoints(usize),

    /// Returned when the grid spacing is non-positive or non-uniform.
    #[error("spatial grid must be increasing and uniformly spaced")]
    BadSpacing,

    /// Returned when more single-particle states are requested than there are
    /// unknown grid points.
    #[error("cannot compute {0} single-particle states on {1} unknowns")]
    TooManyStates(usize, usize),

    /// Returned when diagonalization of the single-particle matrix fails.
    #[error("diagonalization of the single-particle matrix failed: {0}")]
    Eigh(#[from] LinalgError),

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Numerical failures local to a single right-hand-side evaluation or linear
/// solve.
#[derive(Debug, Error)]
pub enum NumError {
    /// Returned when the one-body density matrix cannot be inverted.
    #[error("inversion of the one-body density matrix failed: {0}")]
    DensityInversion(#[source] LinalgError),

    /// Returned when the one-body density matrix cannot be diagonalized.
    #[error("diagonalization of the one-body density matrix failed: {0}")]
    DensityEigh(#[source] LinalgError),

    /// Returned when the Lanczos tridiagonal matrix cannot be diagonalized.
    #[error("diagonalization of the Krylov tridiagonal matrix failed: {0}")]
    KrylovEigh(#[source] LinalgError),

    /// Returned when a Gaussian elimination pass meets a vanishing pivot.
    #[error("zero pivot in tridiagonal elimination at row {0}")]
    ZeroPivot(usize),

    /// Returned when the rank-one (or bordered) correction of a cyclic solve
    /// is singular.
    #[error("singular correction term in cyclic tridiagonal solve")]
    SingularCorrection,

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from time-dependent propagation.
#[derive(Debug, Error)]
pub enum TError {
    /// Returned when a non-positive or non-finite time step is encountered.
    #[error("time steps must be positive and finite; got {0}")]
    BadTimestep(f64),

    /// Returned when an output cadence of zero is encountered.
    #[error("output cadence must be greater than 0")]
    BadCadence,

    /// Returned when the state does not match the system it is propagated
    /// under.
    #[error("state shape mismatch: {0}")]
    Shape(#[from] LengthError),

    /// A numerical failure during a single step; no part of this step was
    /// committed.
    #[error("step {step} failed in {stage}: {source}")]
    Step {
        step: usize,
        stage: Stage,
        #[source]
        source: NumError,
    },

    /// Returned when an output file cannot be created.
    #[error("could not open output file {}: {source}", .path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when writing to an output file fails.
    #[error("could not write to output file {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TError {
    pub(crate) fn check_timestep(dt: f64) -> Result<(), Self> {
        (dt > 0.0 && dt.is_finite()).then_some(()).ok_or(Self::BadTimestep(dt))
    }

    pub(crate) fn check_cadence(every: usize) -> Result<(), Self> {
        (every != 0).then_some(()).ok_or(Self::BadCadence)
    }
}

/// Returned from loading a run [`Config`][crate::config::Config].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// [`toml::de::Error`]
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Returned when a parameter is outside its allowed range.
    #[error("invalid parameter `{0}`: {1}")]
    Invalid(&'static str, String),
}
