use abeles::constants::PI4;
use abeles::{Backend, Complex64, ReflError, Slab, Stack, intensity, reflectivity};
use approx::assert_relative_eq;

fn wavevector(kz: f64, sld: f64) -> Complex64 {
    let k = Complex64::new(kz * kz - PI4 * sld, 0.0).sqrt();
    if k.im < 0.0 { -k } else { k }
}

fn multilayer() -> Stack {
    Stack::new(vec![
        Slab::new(0.0, 0.0, 0.0, 3.0),
        Slab::new(35.0, 6.36e-6, 0.0, 4.0),
        Slab::new(55.0, -0.56e-6, 0.0, 4.0),
        Slab::new(35.0, 6.36e-6, 0.0, 4.0),
        Slab::new(55.0, -0.56e-6, 0.0, 2.0),
        Slab::medium(2.07e-6, 0.0),
    ])
    .unwrap()
}

#[test]
fn test_single_interface_fresnel_law() {
    let q: Vec<f64> = (1..200).map(|i| i as f64 * 1e-3).collect();
    let kz: Vec<f64> = q.iter().map(|q| q / 2.0).collect();
    let r = reflectivity(&kz, &[], &[0.0, 2.07e-6], None, None).unwrap();
    for (i, &k) in kz.iter().enumerate() {
        let k1 = wavevector(k, 2.07e-6);
        let expected = ((k - k1) / (k + k1)).norm_sqr();
        assert_relative_eq!(r[i].norm_sqr(), expected, max_relative = 1e-12);
    }
}

#[test]
fn test_thick_film_two_interface_closed_form() {
    // 1000 Å of 8.0e-6 on 2.07e-6 in vacuum at Q = 0.1
    let kz = 0.05;
    let d = 1000.0;
    let k0 = Complex64::new(kz, 0.0);
    let k1 = wavevector(kz, 8.0e-6);
    let k2 = wavevector(kz, 2.07e-6);
    let r01 = (k0 - k1) / (k0 + k1);
    let r12 = (k1 - k2) / (k1 + k2);
    let phase = (Complex64::new(0.0, 2.0) * k1 * d).exp();
    let expected = (r01 + r12 * phase) / (1.0 + r01 * r12 * phase);

    let r = reflectivity(&[kz], &[d], &[0.0, 8.0e-6, 2.07e-6], None, None).unwrap();
    assert_relative_eq!(r[0].norm_sqr(), expected.norm_sqr(), max_relative = 1e-10);
    assert_relative_eq!(r[0].re, expected.re, max_relative = 1e-10);
    assert_relative_eq!(r[0].im, expected.im, max_relative = 1e-10);

    let stack = Stack::from_arrays(&[d], &[0.0, 8.0e-6, 2.07e-6], None, None).unwrap();
    let m = Backend::Matrix.amplitudes(&stack, &[kz]);
    assert_relative_eq!(m[0].norm_sqr(), expected.norm_sqr(), max_relative = 1e-10);
}

#[test]
fn test_energy_conservation_without_absorption() {
    let kz: Vec<f64> = (0..400).map(|i| i as f64 * 2.5e-4).collect();
    for backend in [Backend::Parratt, Backend::Matrix] {
        let r = intensity(&backend.amplitudes(&multilayer(), &kz));
        for (i, &value) in r.iter().enumerate() {
            assert!(
                (0.0..=1.0 + 1e-12).contains(&value),
                "{backend:?}: R({}) = {value}",
                kz[i]
            );
        }
    }
}

#[test]
fn test_backends_agree() {
    let kz: Vec<f64> = (1..300).map(|i| i as f64 * 5e-4).collect();
    let p = intensity(&Backend::Parratt.amplitudes(&multilayer(), &kz));
    let m = intensity(&Backend::Matrix.amplitudes(&multilayer(), &kz));
    for (a, b) in p.iter().zip(&m) {
        assert_relative_eq!(a, b, max_relative = 1e-9, epsilon = 1e-18);
    }
}

#[test]
fn test_repeats_match_explicit_layers() {
    let block = Stack::new(vec![
        Slab::new(0.0, 0.0, 0.0, 3.0),
        Slab::new(35.0, 6.36e-6, 0.0, 4.0),
        Slab::new(55.0, -0.56e-6, 0.0, 4.0),
        Slab::medium(2.07e-6, 0.0),
    ])
    .unwrap();
    let repeated = block.with_repeats(1..3, 2).unwrap();
    let kz: Vec<f64> = (1..100).map(|i| i as f64 * 1e-3).collect();

    let explicit = Stack::new(vec![
        Slab::new(0.0, 0.0, 0.0, 3.0),
        Slab::new(35.0, 6.36e-6, 0.0, 4.0),
        Slab::new(55.0, -0.56e-6, 0.0, 4.0),
        Slab::new(35.0, 6.36e-6, 0.0, 4.0),
        Slab::new(55.0, -0.56e-6, 0.0, 4.0),
        Slab::medium(2.07e-6, 0.0),
    ])
    .unwrap();
    assert_eq!(
        Backend::Parratt.amplitudes(&repeated, &kz),
        Backend::Parratt.amplitudes(&explicit, &kz)
    );
}

#[test]
fn test_layer_table_matches_arrays() {
    let table = Stack::from_layer_table(&[
        [0.0, 0.0, 0.0, 0.0],
        [100.0, 4.0, 0.01, 3.0],
        [0.0, 2.07, 0.0, 2.0],
    ])
    .unwrap();
    let arrays = Stack::from_arrays(
        &[100.0],
        &[0.0, 4.0e-6, 2.07e-6],
        Some(&[0.0, 0.01e-6, 0.0]),
        Some(&[3.0, 2.0]),
    )
    .unwrap();
    let kz = [0.005, 0.02, 0.06];
    let a = Backend::Parratt.amplitudes(&table, &kz);
    let b = Backend::Parratt.amplitudes(&arrays, &kz);
    for (x, y) in a.iter().zip(&b) {
        assert_relative_eq!(x.re, y.re, max_relative = 1e-12, epsilon = 1e-16);
        assert_relative_eq!(x.im, y.im, max_relative = 1e-12, epsilon = 1e-16);
    }
}

#[test]
fn test_backside_incidence_uses_reversed_stack() {
    let stack = multilayer();
    let kz = [0.01, 0.03];
    let back = Backend::Parratt.amplitudes(&stack, &[-0.01, -0.03]);
    let reversed = Backend::Parratt.amplitudes(&stack.reversed(), &kz);
    assert_eq!(back, reversed);
}

#[test]
fn test_non_finite_kz_is_per_point() {
    let r = Backend::Parratt.amplitudes(&multilayer(), &[0.01, f64::NAN, 0.02]);
    assert!(r[0].is_finite());
    assert!(!r[1].is_finite());
    assert!(r[2].is_finite());
}

#[test]
fn test_shape_errors_before_compute() {
    assert!(matches!(
        reflectivity(&[0.01], &[10.0, 20.0], &[0.0, 1e-6, 2e-6], None, None),
        Err(ReflError::LengthMismatch { field: "sld_real", .. })
    ));
    assert!(matches!(
        reflectivity(&[0.01], &[10.0], &[0.0, 1e-6, 2e-6], None, Some(&[1.0, -1.0])),
        Err(ReflError::NegativeValue { field: "roughness", .. })
    ));
    assert!(matches!(
        reflectivity(&[0.01], &[10.0], &[0.0, 1e-6, 2e-6], Some(&[0.0, 0.0]), None),
        Err(ReflError::LengthMismatch { field: "sld_imag", .. })
    ));
}
