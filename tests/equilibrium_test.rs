use ecpn::coupling::CouplingMatrix;
use ecpn::equilibrium::*;
use ecpn::spectral::SpectralBasis;
use ecpn::EcpnError;

#[test]
fn positive_energy_is_rejected() {
    let err = optical_temperature(2, 1.0, 0.5, &[-1.0, 1.0]).unwrap_err();
    assert!(matches!(err, EcpnError::InvalidParameter { name: "energy", .. }));
}

#[test]
fn non_positive_power_is_rejected() {
    for a in [0.0, -4.0, f64::NAN] {
        let err = optical_temperature(4, a, -2.0, &[-1.0, 0.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, EcpnError::InvalidParameter { name: "power", .. }));
    }
}

#[test]
fn eigenvalue_count_must_match() {
    assert!(optical_temperature(3, 1.0, -1.0, &[-1.0, 1.0]).is_err());
}

#[test]
fn occupancies_sum_to_total_power() {
    let e = [-1.0, 0.0, 0.0, 1.0];
    let eq = thermal_equilibrium(4, 4.0, -2.0, &e).unwrap();

    assert!(eq.temperature > 0.0);
    assert_eq!(eq.mu, chemical_potential(4, 4.0, -2.0, eq.temperature));
    assert!(eq.occupancies.iter().all(|&p| p > 0.0));
    let total: f64 = eq.occupancies.iter().sum();
    assert!((total - 4.0).abs() < 1e-8, "total {total}");
    // Lower eigenfrequencies are more populated.
    assert!(eq.occupancies[0] > eq.occupancies[3]);
}

#[test]
fn equilibrium_of_a_ring_spectrum() {
    let j = CouplingMatrix::structured(1.0, 8, 0.25).unwrap();
    let basis = SpectralBasis::decompose(&j);
    let e: Vec<f64> = basis.eigenfrequencies.iter().map(|&x| -x).collect();
    let mut e_sorted = e.clone();
    e_sorted.sort_by(f64::total_cmp);

    let eq = thermal_equilibrium(8, 8.0, -3.0, &e_sorted).unwrap();
    let total: f64 = eq.occupancies.iter().sum();
    assert!((total - 8.0).abs() < 1e-8);
}

#[test]
fn average_optical_powers_follow_rayleigh_jeans() {
    let p = average_optical_powers(&[0.0, 1.0], 2.0, -1.0);
    assert_eq!(p, vec![2.0, 1.0]);
}
