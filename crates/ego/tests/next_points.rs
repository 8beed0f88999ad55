use approx::assert_abs_diff_eq;
use bayesbox_ego::{
    constant_liar_next_points, expected_improvement, AcquisitionFunction, CategoricalDomain,
    DomainComponent, GaussianCdfFailure, LinearConstraint, NextPointsConfig, OptimizerKind,
    VarType,
};
use bayesbox_gp::covariance::Matern52;
use bayesbox_gp::{GaussianProcess, HistoricalData};
use ndarray::{Array1, Array2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

fn objective(x: f64) -> f64 {
    (3. * x - 1.).powi(2) * (6. * x).sin()
}

#[test]
fn test_one_dimensional_suggestions() {
    let mut rng = Xoshiro256Plus::seed_from_u64(2024);
    let domain = CategoricalDomain::new(vec![DomainComponent::double(0., 1.)], vec![]).unwrap();

    let x = Array2::from_shape_fn((10, 1), |_| rng.gen::<f64>());
    let y: Array1<f64> = x.column(0).mapv(objective);
    let data = HistoricalData::from_arrays(&x, &y, &Array1::from_elem(10, 1e-8)).unwrap();
    let gp = GaussianProcess::new(
        Box::new(Matern52::new(1., &[0.2]).unwrap()),
        data,
        None,
        None,
    )
    .unwrap();

    let ei = expected_improvement(&gp, None).unwrap();
    assert_eq!(ei.name(), "EI");
    let eleventh = Array2::from_elem((1, 1), rng.gen::<f64>());
    let value = ei.evaluate_at_points(eleventh.view()).unwrap()[0];
    assert!(value.is_finite());
    assert!(value >= 0.);

    let config = NextPointsConfig::default().num_multistarts(10).maxiter(20);
    let next = constant_liar_next_points(&gp, &domain, 3, None, &config, &mut rng).unwrap();
    assert_eq!(next.points.dim(), (3, 1));
    assert!(next.acceptable.iter().all(|a| *a));
    for i in 0..3 {
        assert!(domain.check_point_acceptable(&next.points.row(i)));
        for j in 0..i {
            assert!((next.points[[i, 0]] - next.points[[j, 0]]).abs() > 1e-6);
        }
    }
}

#[test]
fn test_mixed_constrained_suggestions_with_failures() {
    let mut rng = Xoshiro256Plus::seed_from_u64(7);
    // x0 <= 3.5 and x1 <= 3 on a double and an int, plus a quantized and a categorical dimension
    let domain = CategoricalDomain::new(
        vec![
            DomainComponent::double(0., 4.),
            DomainComponent::int(0, 4),
            DomainComponent::quantized(&[0.1, 0.5, 2.]),
            DomainComponent::categorical(&[1., 2., 3.]),
        ],
        vec![
            LinearConstraint::new(&[1., 0., 0., 0.], 3.5, VarType::Double),
            LinearConstraint::new(&[0., 1., 0., 0.], 3., VarType::Int),
        ],
    )
    .unwrap();
    let physical = domain.generate_quasi_random_points(12, &mut rng).unwrap();
    assert!(domain.check_points_acceptable(&physical).iter().all(|a| *a));
    let x = domain.map_to_one_hot(&physical).unwrap();
    let y: Array1<f64> = physical
        .rows()
        .into_iter()
        .map(|r| (r[0] - 1.).powi(2) + r[1] + r[2] + if r[3] == 2. { -1. } else { 0. })
        .collect();
    let data = HistoricalData::from_arrays(&x, &y, &Array1::from_elem(12, 1e-6)).unwrap();
    let gp = GaussianProcess::new(
        Box::new(Matern52::new(1., &[1., 1., 1., 1., 1., 1.]).unwrap()),
        data,
        None,
        None,
    )
    .unwrap();
    let failure = GaussianCdfFailure::new(&gp, 3.);

    let config = NextPointsConfig::default()
        .optimizer(OptimizerKind::Adam)
        .num_multistarts(8)
        .maxiter(10);
    let next =
        constant_liar_next_points(&gp, &domain, 3, Some(&failure), &config, &mut rng).unwrap();
    assert_eq!(next.points.dim(), (3, 4));
    assert!(next.acceptable.iter().all(|a| *a));
    for row in next.points.rows() {
        assert!(row[0] <= 3.5 + 1e-9);
        assert!(row[1] <= 3.);
        assert_abs_diff_eq!(row[1], row[1].round(), epsilon = 1e-12);
        assert!([0.1, 0.5, 2.].contains(&row[2]));
        assert!([1., 2., 3.].contains(&row[3]));
    }
    let flags = domain.find_unique_points(&next.points, &physical, 1e-4);
    assert!(flags.iter().all(|f| *f));
}
