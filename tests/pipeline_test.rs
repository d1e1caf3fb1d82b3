use ecpn::coupling::CouplingSpec;
use ecpn::run::{run_single, RunParameters};
use ecpn::snapshot::{list_snapshots, Snapshot};
use ecpn::statistics::{analyze, AnalysisConfig};
use ecpn::thermo::{magnetization, power};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

#[test]
fn uncoupled_linear_network_is_static() {
    let dir = TempDir::new().unwrap();
    let params = RunParameters {
        n: 8,
        h0: 0.0,
        coupling: CouplingSpec::Structured { j0: 1.0, range: 0.0 },
        chi: 0.0,
        dh: 0.01,
        seed: 11,
        t_min: 0.0,
        t_max: 1.0,
        nt: 11,
        log_every: 1,
        max_iterations: 100,
        ..RunParameters::default()
    };

    let outcome = run_single(&params, dir.path(), BTreeMap::new()).unwrap();
    assert!(outcome.heuristic_converged);
    assert_eq!(outcome.samples, 10);
    assert_eq!(outcome.t_final, 1.0);

    let snap = Snapshot::load(&outcome.snapshot_path).unwrap();
    assert_eq!(snap.cfg_fin, snap.cfg_ini);
    assert!(snap.j.iter().flatten().all(|&w| w == 0.0));

    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let res = analyze(&snap, &AnalysisConfig { t_eq: 0.0, resamples: 8 }, &mut rng).unwrap();
    assert_eq!(res.samples, 10);
    assert_eq!(res.row.m_av, magnetization(&snap.cfg_ini));
    assert_eq!(res.row.m_serr, 0.0);
    assert!(res.row.chi < 1e-20);
    assert_eq!(res.row.mse_av, 0.0);
    assert_eq!(res.row.h, 0.0);
}

#[test]
fn disordered_run_writes_snapshot_and_log() {
    let dir = TempDir::new().unwrap();
    let params = RunParameters {
        n: 6,
        h0: -0.3,
        coupling: CouplingSpec::Disordered { j0: 1.2, sigma: 0.5 },
        chi: 1.0,
        dh: 1e-2,
        seed: 2024,
        t_min: 0.0,
        t_max: 2.0,
        nt: 21,
        log_every: 5,
        max_iterations: 5_000,
        ..RunParameters::default()
    };

    let mut meta = BTreeMap::new();
    meta.insert("run_index".to_string(), json!(7));
    let outcome = run_single(&params, dir.path(), meta).unwrap();
    assert_eq!(outcome.samples, 4);
    assert!(outcome.snapshot_path.starts_with(dir.path().join("data_N6")));
    assert!(params.log_path(dir.path()).exists());

    let files = list_snapshots(&dir.path().join("data_N6")).unwrap();
    assert_eq!(files, vec![outcome.snapshot_path.clone()]);

    let snap = Snapshot::load(&outcome.snapshot_path).unwrap();
    assert_eq!(snap.params, params);
    assert_eq!(snap.t.len(), 4);
    for (t, expected) in snap.t.iter().zip([0.1, 0.6, 1.1, 1.6]) {
        assert!((t - expected).abs() < 1e-12);
    }
    for &a in &snap.a {
        assert!((a - 6.0).abs() < 1e-6, "power drifted to {a}");
    }
    assert!((power(&snap.cfg_fin) - 6.0).abs() < 1e-6);
    assert_eq!(snap.metadata.get("run_index"), Some(&json!(7)));
    assert!(snap.metadata.contains_key("heuristic_cost"));
    assert!(snap.metadata.contains_key("solver_accepted_steps"));

    let coupling = snap.coupling().unwrap();
    assert!(coupling.is_symmetric(0.0));
    assert!(coupling.has_zero_diagonal());
}

#[test]
fn same_seed_reproduces_the_run() {
    let params = RunParameters {
        n: 4,
        h0: 0.1,
        coupling: CouplingSpec::Disordered { j0: 1.0, sigma: 0.3 },
        seed: 99,
        t_max: 0.5,
        nt: 6,
        log_every: 1,
        max_iterations: 500,
        ..RunParameters::default()
    };

    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let first = Snapshot::load(&run_single(&params, a.path(), BTreeMap::new()).unwrap().snapshot_path).unwrap();
    let second = Snapshot::load(&run_single(&params, b.path(), BTreeMap::new()).unwrap().snapshot_path).unwrap();

    assert_eq!(first.j, second.j);
    assert_eq!(first.cfg_ini, second.cfg_ini);
    assert_eq!(first.cfgs, second.cfgs);
}

#[test]
fn invalid_parameters_fail_before_any_output() {
    let dir = TempDir::new().unwrap();
    let params = RunParameters { n: 1, ..RunParameters::default() };
    assert!(run_single(&params, dir.path(), BTreeMap::new()).is_err());
    assert!(!dir.path().join("data_N1").exists());
}
