//! Integration tests: TOML configuration through to a finished run, the
//! entanglement self-test, and the thermodynamic-neuron readout.

use floquet_lattice::{
    cancel::CancelToken,
    config::{ AdjacencySpec, Capabilities, ResetTarget, SimConfig, Strictness },
    diagnostics::{ entanglement, DiagnosticsEngine },
    dynamics::Evolver,
    readout::{ self, ThermoNeuron },
    Error,
};

const CONFIG: &str = r#"
n_qubits = 3

[sim]
dt = 0.05
tmax = 1.0
seed = 3
reset_target = "maximally_mixed"
strictness = "strict"
initial = { kind = "plus" }

[bath]
period = 0.5
waveform = "triangle"

[coupling]
adjacency = { kind = "chain" }

[daemon]
n_pulses = 5

[diagnostics]
hotspot_tau_steps = 4
otoc_periods = 1
"#;

#[test]
fn toml_config_drives_a_full_run() {
    let config = SimConfig::from_toml_str(CONFIG).unwrap();
    assert_eq!(config.coupling.adjacency, AdjacencySpec::Chain);
    assert_eq!(config.sim.reset_target, ResetTarget::MaximallyMixed);
    assert_eq!(config.sim.strictness, Strictness::Strict);

    let evolver = Evolver::from_config(&config).unwrap();
    assert_eq!(evolver.ops().edges(), &[(0, 1), (1, 2)]);
    assert_eq!(evolver.pulses().n_segments(), 5);
    let traj = evolver.run(&CancelToken::new()).unwrap();
    assert_eq!(traj.len(), 21);

    let engine = DiagnosticsEngine::new(config.diagnostics.clone()).unwrap();
    let bundle = engine.analyze(&evolver, &traj).unwrap();
    assert_eq!(bundle.cycle_times.len(), 3);
    assert_eq!(bundle.otto.q_hot.dim(), (3, 3));
    assert!(bundle.otoc.is_some());
    let named = bundle.named_series();
    for key in ["t", "logneg", "osee", "j_sep", "choi_purity", "otto_work", "heat_current"] {
        assert!(named.contains_key(key), "missing series {}", key);
    }
}

#[test]
fn invalid_configs_are_rejected_before_running() {
    let asymmetric = r#"
        n_qubits = 2
        [coupling]
        adjacency = { kind = "matrix", matrix = [[0, 1], [0, 0]] }
    "#;
    assert!(matches!(SimConfig::from_toml_str(asymmetric), Err(Error::Config(_))));
    let wrong_size = r#"
        n_qubits = 3
        [coupling]
        adjacency = { kind = "matrix", matrix = [[0, 1], [1, 0]] }
    "#;
    assert!(SimConfig::from_toml_str(wrong_size).is_err());
    let bad_bell = r#"
        n_qubits = 2
        [sim]
        initial = { kind = "bell", a = 0, b = 2 }
    "#;
    assert!(SimConfig::from_toml_str(bad_bell).is_err());
}

#[test]
fn capabilities_are_explicit_values() {
    let core = Capabilities::core_only();
    assert!(!core.export && !core.rendering && !core.sharing);
    assert!(Capabilities::with_export().export);
}

#[test]
fn entanglement_self_test_passes() {
    let report = entanglement::self_test(1e-6).unwrap();
    assert_eq!(report.len(), 4);
    assert!(report.iter().all(|c| c.passed), "{:?}", report);
}

#[test]
fn neuron_realizes_linear_gates_only() {
    let results = readout::logic_tests(&ThermoNeuron::default());
    let names: Vec<&str> = results.keys().copied().collect();
    assert_eq!(names, vec!["AND", "OR", "NAND", "NOR", "XOR"]);
    let realizable: Vec<bool> = results.values().map(|r| r.realizable).collect();
    assert_eq!(realizable, vec![true, true, true, true, false]);
    for r in results.values().filter(|r| r.realizable) {
        let w = r.weights.unwrap();
        assert_eq!(ThermoNeuron::default().truth_table(w), r.target);
    }
}
