use ecpn::coupling::CouplingMatrix;
use ecpn::spectral::SpectralBasis;
use ecpn::heuristic::sample_random_state;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn check_basis(j: &CouplingMatrix) {
    let basis = SpectralBasis::decompose(j);
    let n = j.n();
    let e = &basis.eigenfrequencies;
    let v = &basis.supermodes;

    for k in 1..n {
        assert!(e[k] >= e[k - 1], "eigenfrequencies not ascending: {} > {}", e[k - 1], e[k]);
    }

    let gram = v.transpose() * v;
    for a in 0..n {
        for b in 0..n {
            let expected = if a == b { 1.0 } else { 0.0 };
            assert!((gram[(a, b)] - expected).abs() < 1e-10, "supermodes not orthonormal at ({a}, {b})");
        }
    }

    // J v_k = e_k v_k column by column.
    let jv = j.matrix() * v;
    for k in 0..n {
        for i in 0..n {
            assert!((jv[(i, k)] - e[k] * v[(i, k)]).abs() < 1e-10, "column {k} is not an eigenvector");
        }
    }
}

#[test]
fn ring_basis_is_orthonormal_and_sorted() {
    check_basis(&CouplingMatrix::structured(1.0, 8, 0.2).unwrap());
}

#[test]
fn disordered_basis_is_orthonormal_and_sorted() {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    check_basis(&CouplingMatrix::disordered_with(&mut rng, 1.0, 1.0, 7).unwrap());
}

#[test]
fn nearest_neighbour_ring_spectrum() {
    // Weight 1/2 to both neighbours: e_k = cos(2 pi k / N).
    let n = 8;
    let basis = SpectralBasis::decompose(&CouplingMatrix::structured(1.0, n, 0.2).unwrap());
    let mut expected: Vec<f64> = (0..n)
        .map(|k| (2.0 * std::f64::consts::PI * k as f64 / n as f64).cos())
        .collect();
    expected.sort_by(|a, b| a.total_cmp(b));
    for (got, want) in basis.eigenfrequencies.iter().zip(&expected) {
        assert!((got - want).abs() < 1e-12, "eigenfrequency {got} != {want}");
    }
}

#[test]
fn supermode_amplitudes_round_trip() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let j = CouplingMatrix::disordered_with(&mut rng, 1.2, 0.3, 6).unwrap();
    let basis = SpectralBasis::decompose(&j);
    let psi = sample_random_state(&mut rng, 6, 1.0).unwrap();

    let c = basis.amplitudes_from_field(&psi).unwrap();
    let back = basis.field_from_amplitudes(&c).unwrap();
    for (a, b) in psi.iter().zip(&back) {
        assert!((a - b).norm() < 1e-12);
    }

    // Orthonormal change of basis keeps the total power.
    let p_modes: f64 = psi.iter().map(|p| p.norm_sqr()).sum();
    let p_super: f64 = c.iter().map(|p| p.norm_sqr()).sum();
    assert!((p_modes - p_super).abs() < 1e-10);

    assert!(basis.amplitudes_from_field(&psi[..5]).is_err());
}
