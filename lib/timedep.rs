//! Real- and imaginary-time propagation of the coupled coefficient and orbital
//! equations.
//!
//! Every step is a Strang splitting of the equations of motion into a
//! nonlinear part (the many-body coefficients together with the mean-field
//! terms of the orbital equations) and a linear part (`i ∂φ/∂t = h φ`):
//! ```text
//! nonlinear(dt / 2) → linear(dt) → nonlinear(dt / 2)
//! ```
//! The linear part is always advanced by [`CrankNicolson`]; the nonlinear part
//! is advanced according to a [`Method`]. Imaginary-time relaxation uses the
//! same machinery with `dt = -i dτ`, followed by re-orthonormalization of the
//! orbitals and renormalization of the coefficients.
//!
//! Each step is computed on a copy of the state and only committed once all
//! three sub-steps have succeeded.

use std::{
    fmt,
    fs::File,
    io::{ BufWriter, Write },
    path::PathBuf,
};
use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::Deserialize;
use crate::{
    density::one_body_density,
    domain::Domain,
    error::{ LengthError, NumError, TError },
    fock::FockSpace,
    hamiltonian::{ energy, ManyBodyOperator },
    lanczos::{ propagate, KRYLOV_DIM },
    linear::{ CrankNicolson, CyclicSolver },
    orbital::{ matrix_elements, orbital_rhs },
    utils::{
        coef_norm,
        identity_deviation,
        normalize_coef,
        orthonormalize,
        overlap_matrix,
        write_array,
        write_matrix,
    },
};

pub type TResult<T> = Result<T, TError>;
type NResult<T> = Result<T, NumError>;

/// Number of imaginary-time steps between increases of the step size.
pub const GROWTH_INTERVAL: usize = 2000;

/// Factor by which the imaginary-time step size is increased.
pub const GROWTH_FACTOR: f64 = 1.2;

/// Strategy for the nonlinear half-steps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Fourth-order Runge-Kutta for coefficients and orbitals together.
    #[default]
    Rk4,
    /// Lanczos propagation of the coefficients; orbital Runge-Kutta stages 1-3
    /// see the coefficients from before the sub-step and stage 4 the
    /// propagated ones.
    KrylovBefore,
    /// Lanczos propagation of the coefficients; orbital Runge-Kutta stage 1
    /// sees the coefficients from before the sub-step and stages 2-4 the
    /// propagated ones.
    KrylovAfter,
    /// `KrylovAfter` for the first half-step and `KrylovBefore` for the
    /// second.
    KrylovSymmetric,
}

impl Method {
    /// Return `true` if the coefficients are propagated in a Krylov subspace.
    pub fn is_krylov(&self) -> bool { !matches!(self, Self::Rk4) }
}

/// Sub-step of a split step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// First nonlinear half-step.
    FirstHalf,
    /// Linear full step.
    Linear,
    /// Second nonlinear half-step.
    SecondHalf,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstHalf => write!(f, "first nonlinear half-step"),
            Self::Linear => write!(f, "linear step"),
            Self::SecondHalf => write!(f, "second nonlinear half-step"),
        }
    }
}

/// Many-body state: `M` orbitals sampled on the grid (one per row) and the
/// coefficient vector over the configuration basis.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    pub orb: nd::Array2<C64>,
    pub coef: nd::Array1<C64>,
}

impl State {
    /// Create a new state.
    pub fn new(orb: nd::Array2<C64>, coef: nd::Array1<C64>) -> Self {
        Self { orb, coef }
    }

    /// Create a state with every configuration equally weighted.
    pub fn uniform(space: &FockSpace, orb: nd::Array2<C64>) -> Self {
        let c0 = C64::from((space.nc() as f64).sqrt().recip());
        Self { orb, coef: nd::Array1::from_elem(space.nc(), c0) }
    }
}

// perform the operation `a + v * b` succinctly
fn array_step<S, T, D>(
    a: &nd::ArrayBase<S, D>,
    v: C64,
    b: &nd::ArrayBase<T, D>,
) -> nd::Array<C64, D>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
    D: nd::Dimension,
{
    nd::Zip::from(a).and(b)
        .map_collect(|ak, bk| ak + v * bk)
}

// a ← a + dt / 6 * (k1 + 2 k2 + 2 k3 + k4)
fn rk4_combine<D>(
    a: &mut nd::Array<C64, D>,
    dt: C64,
    k: [&nd::Array<C64, D>; 4],
)
where D: nd::Dimension
{
    nd::Zip::from(a).and(k[0]).and(k[1]).and(k[2]).and(k[3])
        .for_each(|ak, k1, k2, k3, k4| {
            *ak += dt / 6.0 * (k1 + 2.0 * (k2 + k3) + k4);
        });
}

// time derivatives of the nonlinear part
struct Deriv {
    orb: nd::Array2<C64>,
    coef: nd::Array1<C64>,
}

/// Output streams for real-time propagation.
///
/// Writes the orbitals (one line per orbital) to `{prefix}_orb_realtime.dat`
/// and the one-body density matrix (one line, row-major) to
/// `{prefix}_rho_realtime.dat`, once for the initial state and then every
/// `every` steps.
#[derive(Debug)]
pub struct Recorder {
    every: usize,
    orb_path: PathBuf,
    rho_path: PathBuf,
    orb_out: BufWriter<File>,
    rho_out: BufWriter<File>,
}

impl Recorder {
    /// Create (or truncate) both output files.
    pub fn create(prefix: &str, every: usize) -> TResult<Self> {
        TError::check_cadence(every)?;
        let open = |path: &PathBuf| -> TResult<BufWriter<File>> {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|source| TError::OutputOpen { path: path.clone(), source })
        };
        let orb_path = PathBuf::from(format!("{}_orb_realtime.dat", prefix));
        let rho_path = PathBuf::from(format!("{}_rho_realtime.dat", prefix));
        let orb_out = open(&orb_path)?;
        let rho_out = open(&rho_path)?;
        Ok(Self { every, orb_path, rho_path, orb_out, rho_out })
    }

    /// Output cadence in steps.
    pub fn every(&self) -> usize { self.every }

    fn record(&mut self, orb: &nd::Array2<C64>, rho: &nd::Array2<C64>)
        -> TResult<()>
    {
        let orb_path = &self.orb_path;
        orb.rows().into_iter()
            .try_for_each(|phi| write_array(&mut self.orb_out, &phi))
            .map_err(|source| TError::OutputWrite { path: orb_path.clone(), source })?;
        write_matrix(&mut self.rho_out, rho)
            .map_err(|source| {
                TError::OutputWrite { path: self.rho_path.clone(), source }
            })?;
        Ok(())
    }

    fn flush(&mut self) -> TResult<()> {
        self.orb_out.flush()
            .map_err(|source| {
                TError::OutputWrite { path: self.orb_path.clone(), source }
            })?;
        self.rho_out.flush()
            .map_err(|source| {
                TError::OutputWrite { path: self.rho_path.clone(), source }
            })?;
        Ok(())
    }
}

/// `N` bosons in `M` orbitals on a [`Domain`], interacting through a contact
/// potential of strength `g`.
#[derive(Clone, Debug)]
pub struct System {
    space: FockSpace,
    domain: Domain,
    g: f64,
    method: Method,
    solver: CyclicSolver,
    growth_interval: usize,
}

impl System {
    /// Create a new `System` using [`Method::Rk4`], the default cyclic solver,
    /// and imaginary-time step growth every [`GROWTH_INTERVAL`] steps.
    pub fn new(space: FockSpace, domain: Domain, g: f64) -> Self {
        Self {
            space,
            domain,
            g,
            method: Method::default(),
            solver: CyclicSolver::default(),
            growth_interval: GROWTH_INTERVAL,
        }
    }

    /// Set the strategy for the nonlinear half-steps.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the solving method for cyclic linear systems.
    pub fn with_solver(mut self, solver: CyclicSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Set the number of imaginary-time steps between increases of the step
    /// size.
    ///
    /// *Panics if `interval == 0`*.
    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        assert!(interval > 0, "System::with_growth_interval: interval must be at least 1");
        self.growth_interval = interval;
        self
    }

    /// Change the interaction strength.
    pub fn set_g(&mut self, g: f64) { self.g = g; }

    /// Get the configuration basis.
    pub fn space(&self) -> &FockSpace { &self.space }

    /// Get the spatial domain.
    pub fn domain(&self) -> &Domain { &self.domain }

    /// Get the interaction strength.
    pub fn g(&self) -> f64 { self.g }

    /// Get the strategy for the nonlinear half-steps.
    pub fn method(&self) -> Method { self.method }

    /// Get the solving method for cyclic linear systems.
    pub fn solver(&self) -> CyclicSolver { self.solver }

    /// Get the number of imaginary-time steps between step size increases.
    pub fn growth_interval(&self) -> usize { self.growth_interval }

    /// Check that `state` has the shape required by `self`.
    pub fn check_state(&self, state: &State) -> TResult<()> {
        LengthError::check_len(self.space.nc(), state.coef.len())?;
        LengthError::check_len(self.space.norb(), state.orb.nrows())?;
        LengthError::check_len(self.domain.len(), state.orb.ncols())?;
        Ok(())
    }

    /// Compute the energy `<C|H|C>` of a state.
    pub fn energy(&self, state: &State) -> f64 {
        let (ho, hint) = matrix_elements(&self.domain, self.g, &state.orb);
        energy(&self.space, &ho, &hint, &state.coef).re
    }

    // orbital derivative with the coefficients held fixed
    fn orbital_derivative(&self, orb: &nd::Array2<C64>, coef: &nd::Array1<C64>)
        -> NResult<nd::Array2<C64>>
    {
        let (ho, hint) = matrix_elements(&self.domain, self.g, orb);
        orbital_rhs(&self.space, self.g, coef, orb, &ho, &hint)
    }

    // coefficient and orbital derivatives together
    fn derivative(&self, orb: &nd::Array2<C64>, coef: &nd::Array1<C64>)
        -> NResult<Deriv>
    {
        let (ho, hint) = matrix_elements(&self.domain, self.g, orb);
        let dorb = orbital_rhs(&self.space, self.g, coef, orb, &ho, &hint)?;
        let op = ManyBodyOperator::new(&self.space, &ho, &hint);
        let dcoef = op.apply_to(coef).mapv(|hc| -C64::i() * hc);
        Ok(Deriv { orb: dorb, coef: dcoef })
    }

    // RK4 on coefficients and orbitals together
    fn rk4_step(&self, state: &mut State, dt: C64) -> NResult<()> {
        let dth = dt / 2.0;
        let k1 = self.derivative(&state.orb, &state.coef)?;
        let k2 = self.derivative(
            &array_step(&state.orb, dth, &k1.orb),
            &array_step(&state.coef, dth, &k1.coef),
        )?;
        let k3 = self.derivative(
            &array_step(&state.orb, dth, &k2.orb),
            &array_step(&state.coef, dth, &k2.coef),
        )?;
        let k4 = self.derivative(
            &array_step(&state.orb, dt, &k3.orb),
            &array_step(&state.coef, dt, &k3.coef),
        )?;
        rk4_combine(&mut state.orb, dt, [&k1.orb, &k2.orb, &k3.orb, &k4.orb]);
        rk4_combine(
            &mut state.coef, dt, [&k1.coef, &k2.coef, &k3.coef, &k4.coef]);
        Ok(())
    }

    // Lanczos on the coefficients, RK4 on the orbitals; `early` is the number
    // of orbital stages that see the old coefficients
    fn krylov_step(&self, state: &mut State, dt: C64, early: usize)
        -> NResult<()>
    {
        let dth = dt / 2.0;
        let (ho, hint) = matrix_elements(&self.domain, self.g, &state.orb);
        let op = ManyBodyOperator::new(&self.space, &ho, &hint);
        let coef_new = propagate(&op, &state.coef, dt, KRYLOV_DIM)?;
        let coef_at = |stage: usize| {
            if stage < early { &state.coef } else { &coef_new }
        };
        let k1 = orbital_rhs(
            &self.space, self.g, coef_at(0), &state.orb, &ho, &hint)?;
        let k2 = self.orbital_derivative(
            &array_step(&state.orb, dth, &k1), coef_at(1))?;
        let k3 = self.orbital_derivative(
            &array_step(&state.orb, dth, &k2), coef_at(2))?;
        let k4 = self.orbital_derivative(
            &array_step(&state.orb, dt, &k3), coef_at(3))?;
        rk4_combine(&mut state.orb, dt, [&k1, &k2, &k3, &k4]);
        state.coef = coef_new;
        Ok(())
    }

    // nonlinear sub-step under `method`; `second` selects the variant for the
    // second half of a split step
    fn nonlinear_step(
        &self,
        state: &mut State,
        dt: C64,
        method: Method,
        second: bool,
    ) -> NResult<()>
    {
        match method {
            Method::Rk4 => self.rk4_step(state, dt),
            Method::KrylovBefore => self.krylov_step(state, dt, 3),
            Method::KrylovAfter => self.krylov_step(state, dt, 1),
            Method::KrylovSymmetric
                => self.krylov_step(state, dt, if second { 3 } else { 1 }),
        }
    }

    // one full split step, committed to `state` only on success
    fn split_step(
        &self,
        state: &mut State,
        dt: C64,
        cn: &CrankNicolson,
        method: Method,
        step: usize,
    ) -> TResult<()>
    {
        let fail = |stage: Stage| move |source: NumError| {
            TError::Step { step, stage, source }
        };
        let mut next = state.clone();
        self.nonlinear_step(&mut next, dt / 2.0, method, false)
            .map_err(fail(Stage::FirstHalf))?;
        cn.step(&mut next.orb)
            .map_err(fail(Stage::Linear))?;
        self.nonlinear_step(&mut next, dt / 2.0, method, true)
            .map_err(fail(Stage::SecondHalf))?;
        *state = next;
        Ok(())
    }

    /// Propagate `state` in real time for `steps` steps of size `dt`.
    ///
    /// If a [`Recorder`] is given, the initial state and every
    /// [`Recorder::every`]-th state are written to it. On failure, `state`
    /// holds the last successfully computed step and nothing past it has been
    /// recorded.
    pub fn propagate_real(
        &self,
        state: &mut State,
        dt: f64,
        steps: usize,
        mut recorder: Option<&mut Recorder>,
    ) -> TResult<()>
    {
        TError::check_timestep(dt)?;
        self.check_state(state)?;
        let dtc = C64::from(dt);
        let cn = CrankNicolson::new(&self.domain, dtc, self.solver);
        log::info!(
            "real time: {} steps of {:e} ({:?}, {:?})",
            steps, dt, self.method, self.solver,
        );
        if self.method.is_krylov() {
            log::info!("real time: Krylov subspace dimension {}", KRYLOV_DIM);
        }
        if let Some(rec) = recorder.as_deref_mut() {
            let rho = one_body_density(&self.space, &state.coef);
            rec.record(&state.orb, &rho)?;
        }
        for i in 1..=steps {
            self.split_step(state, dtc, &cn, self.method, i)?;
            let record = recorder.as_deref().is_some_and(|rec| i % rec.every() == 0);
            let debug = log::log_enabled!(log::Level::Debug);
            if !(record || debug) { continue; }
            let rho = one_body_density(&self.space, &state.coef);
            if debug {
                let ovlp = overlap_matrix(&state.orb, self.domain.get_dx());
                log::debug!(
                    "step {}: tr(rho) = {:.9}, |C| = {:.9}, orthonormality error = {:.3e}",
                    i,
                    rho.diag().sum().re,
                    coef_norm(&state.coef),
                    identity_deviation(&ovlp),
                );
            }
            if record {
                if let Some(rec) = recorder.as_deref_mut() {
                    rec.record(&state.orb, &rho)?;
                }
            }
        }
        if let Some(rec) = recorder {
            rec.flush()?;
        }
        Ok(())
    }

    /// Relax `state` toward the ground state by propagating in imaginary time
    /// for at most `steps` steps, starting with step size `dtau`.
    ///
    /// The nonlinear half-steps always use fourth-order Runge-Kutta. After every
    /// step the orbitals are orthonormalized and the coefficients renormalized.
    /// The step size grows by [`GROWTH_FACTOR`] every
    /// [`Self::growth_interval`] steps. If `energy_tol` is given, relaxation
    /// stops once the relative change in energy over one step falls below it.
    ///
    /// Returns the energy of the initial state followed by the energy after
    /// each step.
    pub fn relax(
        &self,
        state: &mut State,
        dtau: f64,
        steps: usize,
        energy_tol: Option<f64>,
    ) -> TResult<Vec<f64>>
    {
        TError::check_timestep(dtau)?;
        self.check_state(state)?;
        let dx = self.domain.get_dx();
        let mut dtau = dtau;
        let mut dt = -C64::i() * dtau;
        let mut cn = CrankNicolson::new(&self.domain, dt, self.solver);
        let mut energies: Vec<f64> = Vec::with_capacity(steps + 1);
        energies.push(self.energy(state));
        log::info!(
            "imaginary time: up to {} steps of {:e}, E0 = {:.12}",
            steps, dtau, energies[0],
        );
        for i in 1..=steps {
            self.split_step(state, dt, &cn, Method::Rk4, i)?;
            orthonormalize(&mut state.orb, dx);
            normalize_coef(&mut state.coef);
            let e = self.energy(state);
            let e_prev = energies[energies.len() - 1];
            energies.push(e);
            log::debug!("step {}: dtau = {:e}, E = {:.12}", i, dtau, e);
            if let Some(tol) = energy_tol {
                let rel = (e - e_prev).abs() / e_prev.abs().max(f64::EPSILON);
                if rel < tol {
                    log::info!("imaginary time: converged after {} steps", i);
                    break;
                }
            }
            if i % self.growth_interval == 0 {
                dtau *= GROWTH_FACTOR;
                dt = -C64::i() * dtau;
                cn = CrankNicolson::new(&self.domain, dt, self.solver);
                log::info!("imaginary time: step size increased to {:e}", dtau);
            }
        }
        log::info!(
            "imaginary time: E = {:.12}", energies[energies.len() - 1]);
        Ok(energies)
    }
}
