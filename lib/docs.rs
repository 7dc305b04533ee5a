//! Theoretical background.
//!
//! # Contents
//! - [Background](#background)
//! - [Configuration basis](#configuration-basis)
//! - [Equations of motion](#equations-of-motion)
//! - [Time stepping](#time-stepping)
//! - [Imaginary time](#imaginary-time)
//!
//! # Background
//! The multiconfigurational time-dependent Hartree method for bosons
//! (MCTDHB)[^1][^2] describes *N* identical bosons with the second-quantized
//! Hamiltonian
//! ```text
//! H = Σ_{k,l} Ho[k][l] a†_k a_l + ½ Σ_{k,s,q,l} Hint[k, s, q, l] a†_k a†_s a_q a_l
//! ```
//! where the operators *a*†<sub>*k*</sub> create particles in a set of *M*
//! orthonormal, *time-dependent* single-particle orbitals *φ*<sub>*k*</sub>(*x*,
//! *t*). The one- and two-body matrix elements are
//! ```text
//! Ho[k][l]         = ∫ conj(φ_k) h φ_l dx
//! Hint[k, s, q, l] = g ∫ conj(φ_k φ_s) φ_q φ_l dx
//! ```
//! for the single-particle operator
//! ```text
//! h = a2 ∂² + a1 ∂ + V(x)
//! ```
//! and a contact interaction of strength *g*. With *a*₂ = -½ and *a*₁ = 0 this
//! is the usual kinetic plus potential energy in units where *ħ* = *m* = 1; an
//! imaginary *a*₁ describes a synthetic gauge field or a rotating frame.
//!
//! The many-body state is expanded as
//! ```text
//! |Ψ(t)> = Σ_i C_i(t) |n⃗_i; t>
//! ```
//! over all Fock states (configurations) |*n⃗*> of *N* particles in the *M*
//! current orbitals. Because both the coefficients and the orbitals evolve in
//! time, a handful of orbitals can capture dynamics that would need a much
//! larger fixed basis.
//!
//! # Configuration basis
//! There are
//! ```text
//!          (N + M - 1)!
//! nc = -----------------
//!        N! (M - 1)!
//! ```
//! configurations, which are identified with the integers 0, ..., *nc* - 1 by a
//! combinatorial ranking in which index 0 is (*N*, 0, ..., 0) and *nc* - 1 is
//! (0, ..., 0, *N*). Given the table of counts *T*(*n*, *m*) of configurations
//! of *n* particles in *m* orbitals, an occupation vector is ranked by summing
//! table entries while removing particles from the highest orbital downward,
//! and an index is unranked by the reverse process.
//!
//! Matrix elements of operator strings between configurations follow from
//! ```text
//! a_k |..., n_k, ...>  = √(n_k)     |..., n_k - 1, ...>
//! a†_k |..., n_k, ...> = √(n_k + 1) |..., n_k + 1, ...>
//! ```
//! so neither the density matrices
//! ```text
//! ρ[k][l]        = <Ψ| a†_k a_l |Ψ>
//! ρ2[k, s, q, l] = <Ψ| a†_k a†_s a_q a_l |Ψ>
//! ```
//! nor the action of *H* on the coefficients ever requires an *nc* × *nc*
//! matrix. Since operators of the same kind commute, all orderings of the two
//! creation and two annihilation indices share a single matrix element, and
//! the conjugate element belongs to the swapped placement. Each independent
//! element is therefore evaluated once and copied to all others.
//!
//! # Equations of motion
//! The time-dependent variational principle gives[^1]
//! ```text
//! i dC/dt = H C
//!
//! i ∂φ_k/∂t = h φ_k + (1 - P) g Σ_{j,t,q,l} ρ⁻¹[k][j] ρ2[j, t, q, l] conj(φ_t) φ_q φ_l - P h φ_k
//! ```
//! in a gauge where the orbitals remain orthonormal, with *P* = Σ<sub>*s*</sub>
//! |*φ*<sub>*s*</sub>><<*φ*<sub>*s*</sub>| the projector onto the current
//! orbital space. The projector terms reduce to
//! ```text
//! P h φ_k = Σ_s φ_s Ho[s][k]
//! P (g NL_k) = Σ_s φ_s Σ_{t,q,l} A[k, t, q, l] Hint[s, t, q, l]
//!
//! A[k, t, q, l] = Σ_j ρ⁻¹[k][j] ρ2[j, t, q, l]
//! ```
//! The inverse of the one-body density matrix exists only while every orbital
//! is occupied. For *g* = 0 all terms involving it vanish and are skipped
//! altogether, which is what allows non-interacting systems (where *ρ* is
//! typically singular at the ground state) to be treated.
//!
//! # Time stepping
//! The orbital equation is split into the linear part *i* ∂*φ*/∂*t* = *h φ* and
//! everything else (the *nonlinear* part, which also carries the coefficient
//! equation). A step of size *dt* is the symmetric (Strang) composition
//! ```text
//! nonlinear(dt/2) → linear(dt) → nonlinear(dt/2)
//! ```
//! which has a local error of *O*(*dt*³).
//!
//! The linear part is discretized with second-order central differences and
//! advanced with the Crank-Nicolson scheme
//! ```text
//! (i - dt/2 h) φ(t + dt) = (i + dt/2 h) φ(t)
//! ```
//! which is unconditionally stable and, for Hermitian *h*, exactly unitary. The
//! matrix is tridiagonal for hard-wall boundaries and cyclic tridiagonal for
//! periodic ones; the latter is solved either with a rank-one
//! Sherman-Morrison correction to a plain tridiagonal solve[^3] or by block
//! elimination of the last row and column.
//!
//! The nonlinear part is advanced either by fourth-order Runge-Kutta on the
//! coefficients and orbitals together, or by propagating the coefficients
//! with a short-time Lanczos propagator[^4]
//! ```text
//! C(t + dt) ≈ ‖C‖ V exp(-i T dt) e₀
//! ```
//! where *V* holds an orthonormal basis of the Krylov space {*C*, *HC*, *H*²*C*,
//! ...} and *T* = *V*†*HV* is real and tridiagonal, while the orbitals take
//! Runge-Kutta stages that see either the old or the propagated coefficients.
//!
//! # Imaginary time
//! Substituting *t* → -*i τ* turns the dynamics into a relaxation toward the
//! many-body ground state: components along excited states decay as
//! exp(-(*E* - *E*₀) *τ*). The same split step is used with *dt* = -*i dτ*;
//! since the flow is no longer norm-preserving, the orbitals are
//! re-orthonormalized (Gram-Schmidt under the Simpson inner product) and the
//! coefficients renormalized after every step. As the state approaches the
//! ground state the step size can safely be increased.
//!
//! [^1]: O. E. Alon, A. I. Streltsov, and L. S. Cederbaum, "Multiconfigurational
//! time-dependent Hartree method for bosons: Many-body dynamics of bosonic
//! systems." Phys. Rev. A **77** 033613 (2008).
//!
//! [^2]: A. I. Streltsov, O. E. Alon, and L. S. Cederbaum, "Role of excited
//! states in the splitting of a trapped interacting Bose-Einstein condensate by
//! a time-dependent barrier." Phys. Rev. Lett. **99** 030402 (2007).
//!
//! [^3]: W. H. Press, S. A. Teukolsky, W. T. Vetterling, and B. P. Flannery,
//! *Numerical Recipes*, 3rd ed., §2.7 (Cambridge University Press, 2007).
//!
//! [^4]: T. J. Park and J. C. Light, "Unitary quantum time evolution by
//! iterative Lanczos reduction." J. Chem. Phys. **85** 5870 (1986).
