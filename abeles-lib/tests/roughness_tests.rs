use abeles::{
    Backend, GuideField, InterfaceProfile, Probe, ReflError, RoughnessModel, SimulationConfig,
    Slab, Stack, intensity, microslab, sample_layer, simulate, simulate_polarized, sld_profile,
};
use approx::assert_relative_eq;

fn film(sigma: f64) -> Stack {
    Stack::new(vec![
        Slab::new(0.0, 0.0, 0.0, sigma),
        Slab::new(250.0, 6.0e-6, 0.0, sigma),
        Slab::medium(2.07e-6, 0.0),
    ])
    .unwrap()
}

fn curve(stack: &Stack, kz: &[f64]) -> Vec<f64> {
    intensity(&Backend::Parratt.amplitudes(stack, kz))
}

fn kz_grid(max_q: f64, n: usize) -> Vec<f64> {
    (1..=n).map(|i| 0.5 * max_q * i as f64 / n as f64).collect()
}

#[test]
fn test_microslab_agrees_with_nevot_croce_for_small_roughness() {
    let stack = film(2.0);
    let kz = kz_grid(0.15, 150);
    let analytic = curve(&stack, &kz);
    let sliced = curve(&microslab(&stack, 0.25, InterfaceProfile::Erf).unwrap(), &kz);
    for i in 0..kz.len() {
        assert_relative_eq!(sliced[i], analytic[i], max_relative = 5e-3);
    }
}

#[test]
fn test_halving_step_converges() {
    let stack = film(5.0);
    let kz = kz_grid(0.15, 300);
    let coarse = curve(&microslab(&stack, 0.25, InterfaceProfile::Erf).unwrap(), &kz);
    let fine = curve(&microslab(&stack, 0.125, InterfaceProfile::Erf).unwrap(), &kz);
    for i in 0..kz.len() {
        let change = (fine[i] - coarse[i]).abs() / fine[i];
        assert!(change < 1e-3, "kz={} changed by {change}", kz[i]);
    }
}

#[test]
fn test_vanishing_roughness_reaches_sharp_kernel() {
    let kz = kz_grid(0.2, 100);
    let sharp = curve(&film(0.0), &kz);
    let sliced = curve(&microslab(&film(0.01), 0.002, InterfaceProfile::Erf).unwrap(), &kz);
    for i in 0..kz.len() {
        assert_relative_eq!(sliced[i], sharp[i], max_relative = 1e-4);
    }
}

#[test]
fn test_tanh_profile_matches_erf_at_low_q() {
    // both profiles share the same rms width, so they agree to O((qσ)⁴)
    let stack = film(3.0);
    let kz = kz_grid(0.05, 50);
    let erf = curve(&microslab(&stack, 0.25, InterfaceProfile::Erf).unwrap(), &kz);
    let tanh = curve(&microslab(&stack, 0.25, InterfaceProfile::Tanh).unwrap(), &kz);
    for i in 0..kz.len() {
        assert_relative_eq!(tanh[i], erf[i], max_relative = 1e-2);
    }
}

#[test]
fn test_profile_is_monotone_across_single_interface() {
    let stack =
        Stack::new(vec![Slab::new(0.0, 0.0, 0.0, 4.0), Slab::medium(2.07e-6, 0.0)]).unwrap();
    let z: Vec<f64> = (-60..=60).map(|i| i as f64 * 0.5).collect();
    let points = sld_profile(&stack, &z, InterfaceProfile::Erf);
    assert!(points.windows(2).all(|p| p[1].sld_real >= p[0].sld_real));
    assert_eq!(points[0].sld_real, 0.0);
    assert_eq!(points[points.len() - 1].sld_real, 2.07e-6);
}

#[test]
fn test_simulate_with_microslab_model() {
    let probe = Probe::new((1..100).map(|i| i as f64 * 2e-3).collect());
    let analytic = simulate(&film(2.0), &probe, &SimulationConfig::default()).unwrap();
    let config = SimulationConfig {
        roughness: RoughnessModel::Microslab {
            dz: 0.25,
            profile: InterfaceProfile::Erf,
        },
        ..Default::default()
    };
    let sliced = simulate(&film(2.0), &probe, &config).unwrap();
    for (a, b) in analytic.iter().zip(&sliced) {
        assert_relative_eq!(a, b, max_relative = 5e-3);
    }
}

#[test]
fn test_microslab_twisted_magnetization() {
    // two magnetic layers at 0° and 90° with a graded boundary between them
    let stack = Stack::new(vec![
        Slab::medium(0.0, 0.0),
        Slab::new(100.0, 8.0e-6, 0.0, 10.0).with_magnetism(2.0e-6, 0.0),
        Slab::new(100.0, 8.0e-6, 0.0, 3.0).with_magnetism(2.0e-6, 90.0),
        Slab::medium(2.07e-6, 0.0),
    ])
    .unwrap();
    let probe = Probe::new((1..80).map(|i| i as f64 * 2.5e-3).collect());
    let config = SimulationConfig {
        roughness: RoughnessModel::Microslab {
            dz: 1.0,
            profile: InterfaceProfile::Erf,
        },
        ..Default::default()
    };
    let r = simulate_polarized(&stack, &probe, &GuideField::default(), &config).unwrap();
    for i in 0..probe.q.len() {
        assert!(r.pp[i] + r.pm[i] <= 1.0 + 1e-10);
        assert!(r.mm[i] + r.mp[i] <= 1.0 + 1e-10);
    }
    assert!(r.pm.iter().any(|&x| x > 1e-6));
}

fn fe(z_period: Option<f64>) -> impl Fn(f64) -> Slab {
    move |z| {
        let theta_m = z_period.map_or(0.0, |p| 360.0 * z / p);
        Slab::new(0.0, 8.0e-6, 0.0, 0.0).with_magnetism(5.0e-6, theta_m)
    }
}

fn sandwich(slabs: Vec<Slab>) -> Stack {
    let mut layers = vec![Slab::medium(0.0, 0.0)];
    layers.extend(slabs);
    layers.push(Slab::medium(2.07e-6, 0.0));
    Stack::new(layers).unwrap()
}

#[test]
fn test_sample_layer_helical_magnetization() {
    let slabs = sample_layer(300.0, 5.0, fe(Some(100.0))).unwrap();
    assert_eq!(slabs.len(), 60);
    let total: f64 = slabs.iter().map(|s| s.thickness).sum();
    assert_relative_eq!(total, 300.0, max_relative = 1e-12);
    assert_relative_eq!(slabs[0].theta_m, 9.0, epsilon = 1e-12);
    assert_relative_eq!(slabs[59].theta_m, 1071.0, epsilon = 1e-9);
    assert!(slabs.iter().all(|s| s.roughness == 0.0));

    let stack = sandwich(slabs);
    let probe = Probe::new((1..80).map(|i| i as f64 * 2.5e-3).collect());
    let config = SimulationConfig::default();
    let r = simulate_polarized(&stack, &probe, &GuideField::default(), &config).unwrap();
    for i in 0..probe.q.len() {
        assert!(r.pp[i] + r.pm[i] <= 1.0 + 1e-10);
        assert!(r.mm[i] + r.mp[i] <= 1.0 + 1e-10);
    }
    assert!(r.pm.iter().any(|&x| x > 1e-6));
}

#[test]
fn test_sample_layer_uniform_profile_collapses() {
    let slabs = sample_layer(300.0, 5.0, fe(None)).unwrap();
    assert_eq!(slabs.len(), 1);
    assert_relative_eq!(slabs[0].thickness, 300.0, max_relative = 1e-12);

    let sampled = sandwich(slabs);
    let direct = sandwich(vec![Slab {
        thickness: 300.0,
        ..fe(None)(0.0)
    }]);
    let kz = kz_grid(0.2, 50);
    let a = curve(&sampled, &kz);
    let b = curve(&direct, &kz);
    for i in 0..kz.len() {
        assert_relative_eq!(a[i], b[i], max_relative = 1e-9);
    }
}

#[test]
fn test_sample_layer_rejects_bad_steps() {
    assert!(matches!(
        sample_layer(1.0e6, 1.0e-6, fe(None)),
        Err(ReflError::InvalidStepSize(_))
    ));
    assert!(matches!(
        sample_layer(100.0, 0.0, fe(None)),
        Err(ReflError::InvalidStepSize(_))
    ));
    assert!(matches!(
        sample_layer(-1.0, 1.0, fe(None)),
        Err(ReflError::NegativeValue { .. })
    ));
}
