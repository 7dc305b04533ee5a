//! Run configuration, read from a TOML file.
//!
//! ```toml
//! prefix = "out/ring"
//!
//! [system]
//! npar = 4
//! norb = 2
//! g = 1.0
//!
//! [domain]
//! x_min = -8.0
//! x_max = 8.0
//! points = 257
//! a2 = -0.5
//! a1 = [0.0, 0.0]
//! boundary = "hard-wall"
//! potential = { kind = "harmonic", omega = 1.0 }
//!
//! [imag]
//! dt = 0.002
//! steps = 5000
//! energy_tol = 1e-12
//! growth_interval = 2000
//!
//! [real]
//! dt = 0.001
//! steps = 10000
//! method = "krylov-symmetric"
//! record_every = 50
//! g = 2.0
//!
//! [solver]
//! cyclic = "sherman-morrison"
//! threads = 4
//! ```

use std::{ fs, path::Path, str::FromStr };
use num_complex::Complex64 as C64;
use serde::Deserialize;
use crate::{
    domain::{ Boundary, DResult, Domain },
    error::ConfigError,
    linear::CyclicSolver,
    timedep::{ Method, GROWTH_INTERVAL },
};

pub type CResult<T> = Result<T, ConfigError>;

/// External potentials available from a configuration file.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Potential {
    /// `V(x) = value`
    Flat {
        #[serde(default)]
        value: f64,
    },
    /// `V(x) = ω² (x - center)² / 2`
    Harmonic {
        omega: f64,
        #[serde(default)]
        center: f64,
    },
    /// `V(x) = depth ((x - center)² / width² - 1)²`, with minima at
    /// `center ± width` separated by a barrier of height `depth`.
    DoubleWell {
        depth: f64,
        width: f64,
        #[serde(default)]
        center: f64,
    },
}

impl Default for Potential {
    fn default() -> Self { Self::Flat { value: 0.0 } }
}

impl Potential {
    /// Evaluate the potential at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        match *self {
            Self::Flat { value } => value,
            Self::Harmonic { omega, center }
                => 0.5 * (omega * (x - center)).powi(2),
            Self::DoubleWell { depth, width, center }
                => depth * (((x - center) / width).powi(2) - 1.0).powi(2),
        }
    }
}

fn default_prefix() -> String { "mctdhb".to_string() }

fn default_a2() -> f64 { -0.5 }

fn default_every() -> usize { 1 }

fn default_growth_interval() -> usize { GROWTH_INTERVAL }

/// `[system]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Number of particles.
    pub npar: usize,
    /// Number of orbitals.
    pub norb: usize,
    /// Contact interaction strength.
    #[serde(default)]
    pub g: f64,
}

/// `[domain]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
    pub x_min: f64,
    pub x_max: f64,
    /// Number of grid points, including both ends.
    pub points: usize,
    /// Second-derivative coefficient.
    #[serde(default = "default_a2")]
    pub a2: f64,
    /// First-derivative coefficient as `[re, im]`.
    #[serde(default)]
    pub a1: [f64; 2],
    #[serde(default)]
    pub boundary: Boundary,
    #[serde(default)]
    pub potential: Potential,
}

/// `[imag]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagConfig {
    /// Initial imaginary time step.
    pub dt: f64,
    /// Maximum number of steps.
    pub steps: usize,
    /// Relative energy change below which relaxation stops early.
    #[serde(default)]
    pub energy_tol: Option<f64>,
    /// Number of steps between increases of the step size.
    #[serde(default = "default_growth_interval")]
    pub growth_interval: usize,
}

/// `[real]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealConfig {
    pub dt: f64,
    pub steps: usize,
    #[serde(default)]
    pub method: Method,
    /// Output cadence in steps.
    #[serde(default = "default_every")]
    pub record_every: usize,
    /// Interaction strength after a quench; defaults to `system.g`.
    #[serde(default)]
    pub g: Option<f64>,
}

/// `[solver]` section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    #[serde(default)]
    pub cyclic: CyclicSolver,
    /// Size of the global thread pool; defaults to the number of cores.
    #[serde(default)]
    pub threads: Option<usize>,
}

/// A complete run configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path prefix for all output files.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub system: SystemConfig,
    pub domain: DomainConfig,
    #[serde(default)]
    pub imag: Option<ImagConfig>,
    #[serde(default)]
    pub real: Option<RealConfig>,
    #[serde(default)]
    pub solver: SolverConfig,
}

fn invalid(name: &'static str, msg: impl ToString) -> ConfigError {
    ConfigError::Invalid(name, msg.to_string())
}

fn check_timestep(name: &'static str, dt: f64) -> CResult<()> {
    (dt > 0.0 && dt.is_finite()).then_some(())
        .ok_or_else(|| invalid(name, format!("must be positive; got {}", dt)))
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load<P>(path: P) -> CResult<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| {
                ConfigError::Read { path: path.to_path_buf(), source }
            })?;
        text.parse()
    }

    /// Check all parameters against their allowed ranges.
    pub fn validate(&self) -> CResult<()> {
        if self.system.npar < 1 {
            return Err(invalid("system.npar", "must be at least 1"));
        }
        if self.system.norb < 1 {
            return Err(invalid("system.norb", "must be at least 1"));
        }
        if !self.system.g.is_finite() {
            return Err(invalid("system.g", "must be finite"));
        }
        if self.domain.points < 4 {
            return Err(invalid(
                "domain.points",
                format!("must be at least 4; got {}", self.domain.points),
            ));
        }
        if self.system.norb >= self.domain.points {
            return Err(invalid(
                "system.norb", "must be less than the number of grid points"));
        }
        if self.domain.x_max <= self.domain.x_min {
            return Err(invalid("domain.x_max", "must be greater than domain.x_min"));
        }
        if let Potential::DoubleWell { width, .. } = self.domain.potential {
            if width <= 0.0 {
                return Err(invalid("domain.potential.width", "must be positive"));
            }
        }
        if let Some(imag) = &self.imag {
            check_timestep("imag.dt", imag.dt)?;
            if imag.energy_tol.is_some_and(|tol| tol <= 0.0) {
                return Err(invalid("imag.energy_tol", "must be positive"));
            }
            if imag.growth_interval < 1 {
                return Err(invalid("imag.growth_interval", "must be at least 1"));
            }
        }
        if let Some(real) = &self.real {
            check_timestep("real.dt", real.dt)?;
            if real.record_every < 1 {
                return Err(invalid("real.record_every", "must be at least 1"));
            }
        }
        if self.solver.threads == Some(0) {
            return Err(invalid("solver.threads", "must be at least 1"));
        }
        Ok(())
    }

    /// Build the spatial domain described by the `[domain]` section.
    pub fn build_domain(&self) -> DResult<Domain> {
        let dom = &self.domain;
        let potential = dom.potential;
        Domain::new_linspace(
            (dom.x_min, dom.x_max, dom.points),
            |x| potential.eval(x),
            dom.a2,
            C64::new(dom.a1[0], dom.a1[1]),
            dom.boundary,
        )
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> CResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [system]
        npar = 2
        norb = 2

        [domain]
        x_min = 0.0
        x_max = 1.0
        points = 65
    "#;

    #[test]
    fn defaults() {
        let config: Config = MINIMAL.parse().unwrap();
        assert_eq!(config.prefix, "mctdhb");
        assert_eq!(config.system.g, 0.0);
        assert_eq!(config.domain.a2, -0.5);
        assert_eq!(config.domain.boundary, Boundary::HardWall);
        assert_eq!(config.domain.potential, Potential::Flat { value: 0.0 });
        assert!(config.imag.is_none() && config.real.is_none());
        assert_eq!(config.solver.cyclic, CyclicSolver::ShermanMorrison);
        let dom = config.build_domain().unwrap();
        assert_eq!(dom.len(), 65);
        assert_eq!(dom.get_a2(), -0.5);
        assert!((dom.get_dx() - 1.0 / 64.0).abs() < 1e-15);
    }

    #[test]
    fn full_config() {
        let text = r#"
            prefix = "run"

            [system]
            npar = 4
            norb = 3
            g = 0.5

            [domain]
            x_min = -4.0
            x_max = 4.0
            points = 129
            a1 = [0.0, 0.25]
            boundary = "periodic"
            potential = { kind = "double-well", depth = 2.0, width = 1.5 }

            [imag]
            dt = 0.01
            steps = 100
            energy_tol = 1e-10
            growth_interval = 500

            [real]
            dt = 0.001
            steps = 10
            method = "krylov-before"
            record_every = 5
            g = 1.0

            [solver]
            cyclic = "lu"
            threads = 2
        "#;
        let config: Config = text.parse().unwrap();
        assert_eq!(config.domain.boundary, Boundary::Periodic);
        assert_eq!(
            config.domain.potential,
            Potential::DoubleWell { depth: 2.0, width: 1.5, center: 0.0 },
        );
        assert_eq!(config.domain.potential.eval(1.5), 0.0);
        assert_eq!(config.domain.potential.eval(0.0), 2.0);
        let real = config.real.as_ref().unwrap();
        assert_eq!(real.method, Method::KrylovBefore);
        assert_eq!(real.g, Some(1.0));
        let imag = config.imag.as_ref().unwrap();
        assert_eq!(imag.energy_tol, Some(1e-10));
        assert_eq!(imag.growth_interval, 500);
        assert_eq!(config.solver.cyclic, CyclicSolver::Lu);
        let dom = config.build_domain().unwrap();
        assert_eq!(dom.get_a1(), C64::new(0.0, 0.25));
    }

    #[test]
    fn demo_configs_parse() {
        let harmonic: Config
            = include_str!("../demos/harmonic.toml").parse().unwrap();
        assert!(harmonic.build_domain().is_ok());
        let ring: Config = include_str!("../demos/ring.toml").parse().unwrap();
        assert_eq!(ring.domain.boundary, Boundary::Periodic);
        assert_eq!(ring.solver.cyclic, CyclicSolver::Lu);
        assert!(ring.build_domain().is_ok());
    }

    #[test]
    fn rejects_invalid() {
        let bad_points = MINIMAL.replace("points = 65", "points = 3");
        assert!(matches!(
            bad_points.parse::<Config>(),
            Err(ConfigError::Invalid("domain.points", _)),
        ));
        let bad_range = MINIMAL.replace("x_max = 1.0", "x_max = -1.0");
        assert!(matches!(
            bad_range.parse::<Config>(),
            Err(ConfigError::Invalid("domain.x_max", _)),
        ));
        let bad_dt = format!("{}\n[real]\ndt = 0.0\nsteps = 10\n", MINIMAL);
        assert!(matches!(
            bad_dt.parse::<Config>(),
            Err(ConfigError::Invalid("real.dt", _)),
        ));
        let bad_growth = format!(
            "{}\n[imag]\ndt = 0.01\nsteps = 10\ngrowth_interval = 0\n", MINIMAL);
        assert!(matches!(
            bad_growth.parse::<Config>(),
            Err(ConfigError::Invalid("imag.growth_interval", _)),
        ));
        let default_growth = format!("{}\n[imag]\ndt = 0.01\nsteps = 10\n", MINIMAL);
        let config: Config = default_growth.parse().unwrap();
        assert_eq!(config.imag.unwrap().growth_interval, GROWTH_INTERVAL);
        let unknown = MINIMAL.replace("npar = 2", "npar = 2\nnparticles = 2");
        assert!(matches!(unknown.parse::<Config>(), Err(ConfigError::Parse(_))));
        let bad_method = format!(
            "{}\n[real]\ndt = 0.1\nsteps = 10\nmethod = \"euler\"\n", MINIMAL);
        assert!(matches!(bad_method.parse::<Config>(), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Config::load("/nonexistent/mctdhb.toml"),
            Err(ConfigError::Read { .. }),
        ));
    }
}
