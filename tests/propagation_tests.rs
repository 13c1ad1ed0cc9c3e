use approx::assert_relative_eq;
use nalgebra::Vector2;

use wedgetrace::{
    error::TraceError,
    fit::{fit_wedges, FitOptions, MAX_WEDGE_ANGLE},
    operator::ReflectionOperator,
    settings,
    stack::Stack,
};

// Tolerance for comparing the closed-form operator against the recursion.
const TOL: f64 = 1e-9;

#[test]
fn default_config_propagates() {
    let settings = settings::load_default_config().unwrap();
    let stack = settings.build_stack();
    assert_eq!(stack.len(), 2);

    let reflections = stack
        .reflection_angles(settings.incident, settings.exact)
        .unwrap();
    assert_eq!(reflections.len(), 4);

    stack
        .transmission_angle(settings.incident, settings.exact)
        .unwrap();
}

#[test]
fn operator_matches_recursion_in_a_dense_medium() {
    // Ambient index other than 1 exercises the relative-index coefficients.
    let mut stack = Stack::new(1.33);
    stack.add_mirror(0.008, -0.011, 1.5);
    stack.add_mirror(-0.006, 0.004, 2.4);
    stack.add_mirror(0.002, 0.009, 1.7);

    let operator = ReflectionOperator::from_stack(&stack).unwrap();
    let wedges: Vec<f64> = stack.iter().flat_map(|m| [m.front, m.back]).collect();
    let linear = operator.apply(&wedges).unwrap();
    let recursive = stack.reflection_angles(0.0, false).unwrap();

    assert_eq!(linear.len(), 6);
    for (&l, &r) in linear.iter().zip(recursive.iter()) {
        assert_relative_eq!(l, r, epsilon = TOL);
    }
}

#[test]
fn exact_and_approximate_stacks_agree_for_small_angles() {
    let mut stack = Stack::new(1.0);
    stack.add_mirror(1e-5, -2e-5, 1.5);
    stack.add_mirror(3e-5, 1e-5, 1.33);

    let approx = stack.reflection_angles(1e-5, false).unwrap();
    let exact = stack.reflection_angles(1e-5, true).unwrap();
    for (&a, &e) in approx.iter().zip(exact.iter()) {
        assert_relative_eq!(a, e, epsilon = 1e-12);
    }
}

#[test]
fn total_internal_reflection_surfaces_from_propagation() {
    // Steep incidence plus a strong back wedge pushes the internal angle
    // past the critical angle at the glass-to-air exit.
    let mut stack = Stack::new(1.0);
    stack.add_mirror(0.0, -0.3, 1.5);

    let result = stack.reflection_angles(1.4, true);
    assert!(matches!(
        result,
        Err(TraceError::TotalInternalReflection(_))
    ));
}

#[test]
fn end_to_end_wedge_recovery_three_mirrors() {
    let indices = [1.5, 1.33, 1.7];
    let mut stack = Stack::new(1.0);
    stack.add_mirror(0.012, -0.007, indices[0]);
    stack.add_mirror(-0.004, 0.009, indices[1]);
    stack.add_mirror(0.006, 0.001, indices[2]);

    let observed = stack.reflection_angles(0.0, false).unwrap();
    let fit = fit_wedges(
        &observed,
        1.0,
        &indices,
        false,
        MAX_WEDGE_ANGLE,
        &FitOptions::default(),
    )
    .unwrap();

    assert!(fit.residual < 1e-9, "residual: {}", fit.residual);
    for (recovered, truth) in fit.mirrors.iter().zip(stack.mirrors()) {
        assert_relative_eq!(recovered.front, truth.front, epsilon = 1e-7);
        assert_relative_eq!(recovered.back, truth.back, epsilon = 1e-7);
        assert_relative_eq!(recovered.refr_index, truth.refr_index, epsilon = 1e-15);
    }
}

#[test]
fn vector_stack_round_trips_through_the_operator() {
    let mut stack = Stack::new(1.0);
    stack.add_mirror(Vector2::new(0.01, 0.002), Vector2::new(-0.003, 0.008), 1.5);
    stack.add_mirror(Vector2::new(-0.005, 0.004), Vector2::new(0.006, -0.001), 1.33);

    let operator = ReflectionOperator::from_stack(&stack).unwrap();
    let wedges: Vec<Vector2<f64>> = stack.iter().flat_map(|m| [m.front, m.back]).collect();
    let linear = operator.apply(&wedges).unwrap();
    let recursive = stack.reflection_angles(Vector2::zeros(), false).unwrap();

    for (l, r) in linear.iter().zip(recursive.iter()) {
        assert!((l - r).norm() < TOL);
    }
}
