use std::{ path::PathBuf, time::Instant };
use tracing::info;
use tracing_subscriber::EnvFilter;
use floquet_lattice::{
    cancel::CancelToken,
    config::{ Capabilities, SimConfig },
    control::ControlDaemon,
    diagnostics::DiagnosticsEngine,
    dynamics::Evolver,
};
use lib::{ mkdir, reference_config, summary, write_bundle };

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let capabilities
        = if args.iter().any(|a| a == "--no-export") {
            Capabilities::core_only()
        } else {
            Capabilities::with_export()
        };
    let config: SimConfig
        = match args.iter().find(|a| !a.starts_with("--")) {
            Some(path) => SimConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => reference_config(),
        };
    info!(n_qubits = config.n_qubits, daemon = config.daemon.enable, "loaded configuration");

    let cancel = CancelToken::new();
    let mut evolver = Evolver::from_config(&config)?;
    if config.daemon.enable {
        let daemon
            = ControlDaemon::new(
                evolver.clone(), config.daemon.clone(), config.diagnostics.clone())?;
        let result = daemon.run(&cancel)?;
        println!(
            "daemon: baseline = {:.5}, best = {:.5} after {} iterations",
            result.baseline_score, result.best_score, result.trace.len(),
        );
        evolver = evolver
            .with_pulses(result.pulses)?
            .with_scales(result.dephasing_scales, result.noise_scales)?;
    }

    let t0 = Instant::now();
    let traj = evolver.run(&cancel)?;
    let bundle = DiagnosticsEngine::new(config.diagnostics.clone())?
        .analyze(&evolver, &traj)?;
    info!(frames = traj.len(), elapsed = ?t0.elapsed(), "evolution and diagnostics done");
    summary(&bundle).iter().for_each(|line| println!("{}", line));

    if capabilities.export {
        let outdir = PathBuf::from("output");
        mkdir(&outdir)?;
        let path = outdir.join("lattice_floquet.npz");
        let n = write_bundle(&path, &bundle)?;
        println!("wrote {} series to {}", n, path.display());
    }

    println!("done");
    Ok(())
}
