use fieldalign_core::coordinates::to_cartesian;
use fieldalign_core::domain::{AlignErrorCategory, Axis, FieldVector};
use fieldalign_core::objective::Objective;
use fieldalign_core::optimizer::{LineSearchSettings, optimize_axis};
use fieldalign_core::simulation::{BenchConfig, MagnetLayout, SimulatedBench};
use fieldalign_core::sweep::{OptimizeStrategy, SweepRequest, optimize_and_ramp_r};
use fieldalign_core::sweeps::{SweepGenerator, measure_components_spherical};

fn new_bench(layout: MagnetLayout) -> SimulatedBench {
    SimulatedBench::new(BenchConfig {
        layout,
        ..BenchConfig::default()
    })
    .expect("default bench should be valid")
}

fn request(magnitudes: Vec<f64>, strategy: OptimizeStrategy) -> SweepRequest {
    SweepRequest {
        optimize_strategy: strategy,
        settle_time: 0.0,
        ..SweepRequest::new(magnitudes, 90.0, 90.0, Axis::X)
    }
}

#[test]
fn always_reoptimizing_tracks_the_sample_plane() {
    let bench = new_bench(MagnetLayout::Composite);
    let mut magnet = bench.composite_magnet().expect("magnet should build");
    let mut resonator = bench.resonator();
    let scheduler = bench.scheduler();
    let model = *resonator.model();

    let report = optimize_and_ramp_r(
        &mut magnet,
        &mut resonator,
        &scheduler,
        &request(vec![0.05, 0.1], OptimizeStrategy::Always),
    )
    .expect("sweep should complete");

    assert_eq!(report.optimizations, 2);
    assert!(
        (91.5..92.5).contains(&report.final_phi),
        "phi should turn toward the plane, got {}",
        report.final_phi
    );
    assert!((report.final_theta - 90.0).abs() < 0.1);

    let field = bench.field();
    assert!(field.dot(&model.normal()).abs() < 2.5e-4);
    assert!((field.norm() - 0.1).abs() < 1.0e-3);

    let unaligned = model.frequency(to_cartesian(0.1, 90.0, 90.0), 0.0);
    assert!(report.final_objective > unaligned + 1.0e7);

    let history = report.history.expect("history should be returned");
    assert_eq!(history.magnitudes, vec![0.05, 0.1]);
    assert_eq!(history.objectives.len(), 4);
    assert_eq!(history.optima.len(), 4);
    assert_eq!(history.optima[0], [90.0, 90.0]);
    assert_eq!(history.optima[3], [report.final_theta, report.final_phi]);
}

#[test]
fn without_policy_angles_never_move() {
    let bench = new_bench(MagnetLayout::Composite);
    let mut magnet = bench.composite_magnet().expect("magnet should build");
    let mut resonator = bench.resonator();

    let report = optimize_and_ramp_r(
        &mut magnet,
        &mut resonator,
        &bench.scheduler(),
        &request(vec![0.05, 0.1], OptimizeStrategy::None),
    )
    .expect("sweep should complete");

    assert_eq!(report.optimizations, 0);
    assert_eq!((report.final_theta, report.final_phi), (90.0, 90.0));
    assert_eq!(resonator.readings(), 3);

    let field = bench.field();
    assert!(field.x.abs() < 1.0e-12);
    assert!((field.y - 0.1).abs() < 1.0e-12);
}

#[test]
fn optimize_first_then_objective_decrease_with_loose_threshold() {
    let bench = new_bench(MagnetLayout::Composite);
    let mut magnet = bench.composite_magnet().expect("magnet should build");
    let mut resonator = bench.resonator();

    let loose = SweepRequest {
        optimize_first: true,
        reoptimization_threshold: Some(1.0e6),
        ..request(vec![0.05, 0.06, 0.1], OptimizeStrategy::ObjectiveDecrease)
    };
    let report = optimize_and_ramp_r(&mut magnet, &mut resonator, &bench.scheduler(), &loose)
        .expect("sweep should complete");
    assert_eq!(report.optimizations, 1);

    let bench = new_bench(MagnetLayout::Composite);
    let mut magnet = bench.composite_magnet().expect("magnet should build");
    let mut resonator = bench.resonator();
    let tight = SweepRequest {
        reoptimization_threshold: Some(1.0e3),
        ..loose
    };
    let report = optimize_and_ramp_r(&mut magnet, &mut resonator, &bench.scheduler(), &tight)
        .expect("sweep should complete");
    assert_eq!(report.optimizations, 3);
}

#[test]
fn optimize_at_fields_runs_only_near_listed_magnitudes() {
    let bench = new_bench(MagnetLayout::Native);
    let mut magnet = bench.native_magnet();
    let mut resonator = bench.resonator();

    let request = SweepRequest {
        optimize_at: Some(vec![0.1004]),
        ..request(vec![0.05, 0.1, 0.2], OptimizeStrategy::OptimizeAtFields)
    };
    let report = optimize_and_ramp_r(&mut magnet, &mut resonator, &bench.scheduler(), &request)
        .expect("sweep should complete");

    assert_eq!(report.optimizations, 1);
    assert!(report.final_phi > 91.0);
}

#[test]
fn sweep_beyond_ceiling_leaves_the_bench_untouched() {
    let bench = new_bench(MagnetLayout::Native);
    let mut magnet = bench.native_magnet();
    let mut resonator = bench.resonator();

    let request = SweepRequest {
        initial_phi: 0.0,
        max_field_strength: 1.5,
        ..request(vec![2.0], OptimizeStrategy::Always)
    };
    let error = optimize_and_ramp_r(&mut magnet, &mut resonator, &bench.scheduler(), &request)
        .expect_err("2 T should be rejected");

    assert_eq!(error.category(), AlignErrorCategory::SafetyLimitViolation);
    assert!(bench.ramp_log().is_empty());
    assert_eq!(bench.field(), FieldVector::ZERO);
    assert_eq!(resonator.readings(), 0);
}

#[test]
fn narrow_amplitude_limit_aborts_the_sweep() {
    let bench = new_bench(MagnetLayout::Composite);
    let mut magnet = bench.composite_magnet().expect("magnet should build");
    let mut resonator = bench.resonator();

    let request = SweepRequest {
        line_search: LineSearchSettings {
            max_amplitude: 1.0e-3,
            ..LineSearchSettings::default()
        },
        ..request(vec![0.1], OptimizeStrategy::Always)
    };
    let error = optimize_and_ramp_r(&mut magnet, &mut resonator, &bench.scheduler(), &request)
        .expect_err("the optimum lies beyond 1 mT");

    assert_eq!(error.code(), "SAFETY.AXIS_AMPLITUDE");
    assert!(bench.field().x.abs() <= 1.0e-3 + 1.0e-12);
}

#[test]
fn single_axis_search_reports_history_and_direction() {
    let bench = new_bench(MagnetLayout::Native);
    let mut magnet = bench.native_magnet();
    let mut resonator = bench.resonator();
    let scheduler = bench.scheduler();

    SweepGenerator::r(90.0, 90.0, vec![0.05], 1.5)
        .run(&mut magnet, &scheduler, |_, _| Ok(()))
        .expect("sweep generator should ramp");
    let before = resonator.measure().expect("reading");

    let report = optimize_axis(
        &mut magnet,
        &mut resonator,
        &scheduler,
        Axis::X,
        &LineSearchSettings {
            settle_time: 0.0,
            record_history: true,
            ..LineSearchSettings::default()
        },
    )
    .expect("line search should finish");

    let history = report.history.as_ref().expect("history was requested");
    assert_eq!(history.len(), report.steps + 1);
    let best = report.best_sample().expect("history is non-empty");
    assert!(best.objective > before);
    assert!(best.position < 0.0);

    let direction = report.final_direction.expect("field is far above 2 mT");
    let measured = measure_components_spherical(&mut magnet).expect("measurement");
    assert!((direction.phi - measured.phi).abs() < 1.0e-9);
}
