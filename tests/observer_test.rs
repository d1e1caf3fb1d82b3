use ecpn::coupling::{CouplingMatrix, CouplingSpec};
use ecpn::observer::{format_sample, Observer};
use ecpn::run::RunParameters;
use ecpn::snapshot::{list_snapshots, Snapshot};
use ecpn::thermo::{energy_density, magnetization_cplx, power};
use ecpn::EcpnError;
use num_complex::Complex64;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn params() -> RunParameters {
    RunParameters {
        n: 4,
        h0: 0.25,
        coupling: CouplingSpec::Structured { j0: 1.0, range: 0.25 },
        chi: 0.5,
        nt: 10,
        t_max: 9.0,
        log_every: 3,
        ..RunParameters::default()
    }
}

fn config(k: usize) -> Vec<Complex64> {
    (0..4).map(|i| Complex64::from_polar(1.0, 0.1 * (i + k) as f64)).collect()
}

#[test]
fn records_every_stride_step() {
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();
    let mut obs = Observer::new(j.clone(), 0.5, 10, 3).unwrap();
    for step in 0..10 {
        obs.record(step, step as f64, &config(step)).unwrap();
    }

    let traj = obs.trajectory();
    assert_eq!(traj.t, vec![0.0, 3.0, 6.0, 9.0]);
    assert_eq!(traj.len(), 4);
    assert_eq!(traj.cfgs.len(), 4);
    assert_eq!(traj.cfgs[1], config(3));
    assert!((traj.a[1] - power(&config(3))).abs() < 1e-15);
    assert_eq!(traj.h[2], energy_density(&j, 0.5, &config(6)));
    assert_eq!(traj.m_cplx[3], magnetization_cplx(&config(9)));
}

#[test]
fn zero_stride_is_rejected() {
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();
    assert!(Observer::new(j, 0.5, 10, 0).is_err());
}

#[test]
fn zero_output_times_are_rejected() {
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();
    let err = Observer::new(j, 0.5, 0, 1).err().unwrap();
    assert!(matches!(err, EcpnError::InvalidParameter { name: "nt", .. }));
}

#[test]
fn progress_log_has_header_and_one_line_per_sample() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("logs_N4").join("N4_h00.250000.log");
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();

    let mut obs = Observer::new(j, 0.5, 10, 3).unwrap().with_log(&log).unwrap();
    for step in 0..10 {
        obs.record(step, step as f64, &config(step)).unwrap();
    }
    drop(obs);

    let text = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2 + 4);
    assert!(lines[0].starts_with("# PID: "));
    assert_eq!(lines[1], "# (%) (t) (h) (m)");
    let cols: Vec<&str> = lines[3].split_whitespace().collect();
    assert_eq!(cols.len(), 4);
    assert_eq!(cols[0], "0.300");
    assert_eq!(cols[1], "3.00");
    assert_eq!(cols[2].split('.').nth(1).map(str::len), Some(9));
    assert_eq!(cols[3].split('.').nth(1).map(str::len), Some(3));
}

#[test]
fn sample_line_format() {
    assert_eq!(format_sample(0.3, 3.0, -0.123456789, 0.5), "0.300  3.00 -0.123456789 0.500");
}

#[test]
fn snapshot_round_trip_keeps_extra_metadata() {
    let dir = TempDir::new().unwrap();
    let p = params();
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();
    let mut obs = Observer::new(j.clone(), p.chi, p.nt, p.log_every).unwrap();
    for step in 0..9 {
        obs.record(step, step as f64 + 1.0, &config(step)).unwrap();
    }

    let mut meta = BTreeMap::new();
    meta.insert("note".to_string(), json!("sweep A"));
    meta.insert("replica".to_string(), json!(3));

    let path = p.snapshot_path(dir.path());
    let written = obs.finalize(&p, config(0), config(8), meta, &path).unwrap();
    assert!(path.exists());

    let back = Snapshot::load(&path).unwrap();
    assert_eq!(back.params, p);
    assert_eq!(back.n, 4);
    assert_eq!(back.j, j.to_rows());
    assert_eq!(back.t, written.t);
    assert_eq!(back.h, written.h);
    assert_eq!(back.m_cplx, written.m_cplx);
    assert_eq!(back.cfgs, written.cfgs);
    assert_eq!(back.cfg_ini, config(0));
    assert_eq!(back.cfg_fin, config(8));
    assert!(back.proc_end >= back.proc_start);
    assert_eq!(back.metadata.get("note"), Some(&json!("sweep A")));
    assert_eq!(back.metadata.get("replica"), Some(&json!(3)));
    assert_eq!(back.coupling().unwrap(), j);

    assert_eq!(list_snapshots(path.parent().unwrap()).unwrap(), vec![path.clone()]);
}

#[test]
fn persistence_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let p = params();
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();
    let obs = Observer::new(j, p.chi, p.nt, p.log_every).unwrap();
    let err = obs
        .finalize(&p, config(0), config(0), BTreeMap::new(), &blocker.join("data").join("x.json.gz"))
        .unwrap_err();
    assert!(matches!(err, EcpnError::Io { .. }), "unexpected error {err}");
}

#[test]
fn metadata_shadowing_a_field_is_rejected_before_writing() {
    let dir = TempDir::new().unwrap();
    let p = params();
    let j = CouplingMatrix::structured(1.0, 4, 0.25).unwrap();

    for key in ["chi", "n", "t", "params"] {
        let obs = Observer::new(j.clone(), p.chi, p.nt, p.log_every).unwrap();
        let mut meta = BTreeMap::new();
        meta.insert(key.to_string(), json!(5.0));

        let path = dir.path().join(format!("{key}.json.gz"));
        let err = obs.finalize(&p, config(0), config(0), meta, &path).unwrap_err();
        assert!(matches!(err, EcpnError::InvalidParameter { name: "metadata", .. }), "key {key}: {err}");
        assert!(!path.exists(), "nothing should be written for key {key}");
    }
}
