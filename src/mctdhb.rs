use std::{
    fs::File,
    io::{ BufWriter, Write },
    path::PathBuf,
};
use anyhow::Context;
use mctdhb::{
    analysis,
    config::Config,
    density::one_body_density,
    fock::FockSpace,
    timedep::{ Recorder, State, System },
};

const DEFAULT_CONFIG: &str = "mctdhb.toml";

fn write_energies(path: &PathBuf, energies: &[f64]) -> anyhow::Result<()> {
    let mut out = BufWriter::new(
        File::create(path)
            .with_context(|| format!("could not create {}", path.display()))?
    );
    for e in energies.iter() {
        writeln!(out, "{:.15E}", e)?;
    }
    out.flush()?;
    Ok(())
}

fn report(system: &System, state: &State, label: &str) -> anyhow::Result<()> {
    let npar = system.space().npar();
    let rho = one_body_density(system.space(), &state.coef);
    let natural = analysis::natural_orbitals(&rho, &state.orb)?;
    log::info!(
        "{}: E = {:.12}, occupations = {:.6}, S = {:.6}, condensate fraction = {:.6}",
        label,
        system.energy(state),
        natural.occupations,
        analysis::von_neumann_entropy(&natural.occupations, npar),
        analysis::condensate_fraction(&natural.occupations, npar),
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = Config::load(&path)
        .with_context(|| format!("could not load configuration from {}", path))?;

    if let Some(threads) = config.solver.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let space = FockSpace::new(config.system.npar, config.system.norb)?;
    let domain = config.build_domain()?;
    log::info!(
        "{} particles in {} orbitals: {} configurations; {} grid points, dx = {:e}",
        space.npar(), space.norb(), space.nc(), domain.len(), domain.get_dx(),
    );
    let orb = domain.lowest_states(space.norb())?;
    let mut state = State::uniform(&space, orb);
    let mut system
        = System::new(space, domain, config.system.g)
        .with_solver(config.solver.cyclic);

    if let Some(imag) = config.imag.as_ref() {
        system = system.with_growth_interval(imag.growth_interval);
        let energies
            = system.relax(&mut state, imag.dt, imag.steps, imag.energy_tol)?;
        let outfile = PathBuf::from(format!("{}_imag_energy.dat", config.prefix));
        write_energies(&outfile, &energies)?;
        report(&system, &state, "relaxed")?;
    }

    if let Some(real) = config.real.as_ref() {
        if let Some(g) = real.g {
            log::info!("quench: g = {} -> {}", system.g(), g);
            system.set_g(g);
        }
        system = system.with_method(real.method);
        let mut recorder = Recorder::create(&config.prefix, real.record_every)?;
        system.propagate_real(&mut state, real.dt, real.steps, Some(&mut recorder))?;
        report(&system, &state, "final")?;
    }

    Ok(())
}
