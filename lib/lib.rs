#![allow(dead_code, non_snake_case)]

//! Provides functions and higher-level constructs for the propagation of `N`
//! identical bosons expanded in `M` time-dependent single-particle orbitals on
//! a one-dimensional grid (the multiconfigurational time-dependent Hartree
//! method for bosons, MCTDHB).
//!
//! The many-body state is a coefficient vector over the occupation-number
//! (Fock) basis coupled to a set of discretized orbitals. Both are evolved
//! under a Hamiltonian with a one-body part `a2 ∂² + a1 ∂ + V(x)` and a contact
//! two-body interaction of strength `g`.
//!
//! Provides implementations for the following numerical routines:
//! - Many-body algebra:
//!     - Combinatorial Fock-space indexing
//!     - One- and two-body reduced density matrices
//!     - Matrix-free many-body Hamiltonian action
//! - Time-dependent:
//!     - Krylov (Lanczos) short-time propagation of the coefficients
//!     - Fourth-order Runge-Kutta for the coupled nonlinear equations
//!     - Crank-Nicolson for the linear part of the orbital equations
//!     - Strang-split real-time propagation and imaginary-time relaxation
//! - Analysis:
//!     - Natural occupations and orbitals, von Neumann entropy, spatial density
//!
//! See [`docs`] for theoretical background.

pub mod error;
pub mod utils;
pub mod fock;
pub mod placement;
pub mod density;
pub mod hamiltonian;
pub mod lanczos;
pub mod domain;
pub mod orbital;
pub mod linear;
pub mod timedep;
pub mod analysis;
pub mod config;

pub mod docs;

pub(crate) const DEF_EPSILON: f64 = 1e-6;

pub type Arr1<S> = ndarray::ArrayBase<S, ndarray::Ix1>;
pub type Arr2<S> = ndarray::ArrayBase<S, ndarray::Ix2>;
