//! Shared helpers for the driver binaries.

use std::{ fs, path::Path };
use ndarray_npy::NpzWriter;
use floquet_lattice::{
    config::{ AdjacencySpec, SimConfig },
    diagnostics::DiagnosticsBundle,
};

/// Create a directory and all its parents if it doesn't exist already.
pub fn mkdir<P: AsRef<Path>>(dir: P) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        println!(":: mkdir -p {}", dir.display());
    }
    Ok(())
}

/// The 4-qubit ring run with reference parameters.
pub fn reference_config() -> SimConfig {
    let mut config = SimConfig { n_qubits: 4, ..SimConfig::default() };
    config.coupling.adjacency = AdjacencySpec::Ring;
    config
}

/// Write every named series of `bundle` into one `.npz` archive.
pub fn write_bundle<P: AsRef<Path>>(path: P, bundle: &DiagnosticsBundle)
    -> anyhow::Result<usize>
{
    let file = fs::File::create(path.as_ref())?;
    let mut npz = NpzWriter::new(file);
    let series = bundle.named_series();
    for (name, array) in series.iter() {
        npz.add_array(name.as_str(), array)?;
    }
    npz.finish()?;
    Ok(series.len())
}

/// One-line summaries of the headline series.
pub fn summary(bundle: &DiagnosticsBundle) -> Vec<String> {
    ["purity", "logneg_mean", "mi_half", "osee", "bures_velocity", "heat_current_lattice"]
        .into_iter()
        .filter_map(|name| {
            bundle.stats(name)
                .map(|s| format!(
                    "{:>20}: max = {:.5} @ t = {:.3}, area = {:.5}",
                    name, s.max, bundle.times[s.argmax], s.area,
                ))
        })
        .collect()
}
