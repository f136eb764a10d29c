//! End-to-end scenarios over the built-in driving controller

use std::io::Write;

use fuzzdrive::simulation::{assign_road_conditions, load_driving_log};
use fuzzdrive::{
    ControllerConfig, CrispInputs, Engine, ErrorCode, FixedDistance, OnRowError, SeededUniformDistance, Simulation,
};

fn engine() -> Engine {
    ControllerConfig::driving().build().unwrap()
}

fn inputs(distance: f64, speed: f64, road_condition: f64, throttle: f64) -> CrispInputs {
    CrispInputs::new()
        .with("distance", distance)
        .with("speed", speed)
        .with("road_condition", road_condition)
        .with("throttle", throttle)
}

#[test]
fn test_close_and_fast_brakes() {
    let engine = engine();

    for (road, throttle) in [(0.0, 0.0), (1.0, 0.1)] {
        let tuple = inputs(10.0, 90.0, road, throttle);
        let inference = engine.inspect(&tuple).unwrap();

        // close AND high, close AND medium
        assert!((inference.activations[0].strength.value() - 0.8).abs() < 0.001);
        assert!((inference.activations[1].strength.value() - 0.2).abs() < 0.001);

        let decision = engine.evaluate(&tuple).unwrap();
        assert_eq!(decision.label, "brake", "output {}", decision.output);
        assert!(decision.output < 40.0);
    }
}

#[test]
fn test_far_slow_good_road_accelerates() {
    let engine = engine();
    let decision = engine.evaluate(&inputs(90.0, 5.0, 9.0, 0.9)).unwrap();
    assert_eq!(decision.label, "accelerate", "output {}", decision.output);
    assert!(decision.output > 60.0 && decision.output < 75.0);
}

#[test]
fn test_normal_road_holds() {
    // road normal fires "hold" at full strength
    let decision = engine().evaluate(&inputs(10.0, 90.0, 5.0, 0.5)).unwrap();
    assert_eq!(decision.label, "hold", "output {}", decision.output);
}

#[test]
fn test_speed_above_universe_counts_as_high() {
    let engine = engine();
    let at_max = engine.evaluate(&inputs(10.0, 100.0, 1.0, 0.1)).unwrap();
    let above = engine.evaluate(&inputs(10.0, 130.0, 1.0, 0.1)).unwrap();
    assert_eq!(at_max, above);
}

#[test]
fn test_missing_and_invalid_inputs() {
    let engine = engine();
    let partial = CrispInputs::new().with("distance", 10.0).with("speed", 90.0);
    let err = engine.evaluate(&partial).unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingInput);
    assert_eq!(err.context_field("variable"), Some("road_condition"));
    assert!(err.is_evaluation_error());

    let err = engine.evaluate(&inputs(10.0, f64::INFINITY, 5.0, 0.5)).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[test]
fn test_rule_order_does_not_change_output() {
    let engine = engine();
    let reversed: Vec<usize> = (0..engine.rule_base().len()).rev().collect();
    let rule_base = engine.rule_base().reordered(&reversed).unwrap();

    for tuple in [inputs(10.0, 90.0, 1.0, 0.1), inputs(90.0, 5.0, 9.0, 0.9), inputs(42.0, 61.0, 7.0, 0.3)] {
        let a = engine.evaluate(&tuple).unwrap();
        let b = fuzzdrive::evaluate(&rule_base, engine.bands(), &tuple).unwrap();
        assert!((a.output - b.output).abs() < 1e-9);
        assert_eq!(a.label, b.label);
    }
}

#[test]
fn test_rebuilt_from_toml_matches() {
    let text = ControllerConfig::driving().to_toml().unwrap();
    let rebuilt = ControllerConfig::load_from_str(&text).unwrap().build().unwrap();
    let engine = engine();
    for i in 0..50 {
        let tuple = inputs(i as f64 * 2.0, 100.0 - i as f64 * 2.0, (i % 11) as f64, (i % 11) as f64 / 10.0);
        assert_eq!(engine.evaluate(&tuple).unwrap(), rebuilt.evaluate(&tuple).unwrap());
    }
}

#[test]
fn test_finer_resolution_agrees() {
    let coarse = engine();
    let mut config = ControllerConfig::driving();
    config.inference.resolution = Some(0.1);
    let fine = config.build().unwrap();

    let tuple = inputs(90.0, 5.0, 9.0, 0.9);
    let a = coarse.evaluate(&tuple).unwrap();
    let b = fine.evaluate(&tuple).unwrap();
    assert!((a.output - b.output).abs() < 1.0);
    assert_eq!(a.label, b.label);
}

#[test]
fn test_batch_matches_sequential() {
    let engine = engine();
    let batch: Vec<CrispInputs> = (0..200)
        .map(|i| inputs((i * 7 % 101) as f64, (i * 13 % 101) as f64, (i % 11) as f64, (i % 11) as f64 / 10.0))
        .collect();
    let parallel = engine.evaluate_batch(&batch);
    for (tuple, result) in batch.iter().zip(parallel) {
        let expected = engine.evaluate(tuple).map(|e| (e.output.to_bits(), e.label));
        assert_eq!(result.map(|e| (e.output.to_bits(), e.label)), expected);
    }
}

#[test]
fn test_driving_log_replay() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "time,speed,throttle").unwrap();
    for i in 0..30 {
        writeln!(file, "{},{},{}", i, 2.0 + i as f64, (i % 10) as f64 / 10.0).unwrap();
    }
    writeln!(file, "30,,0.5").unwrap();

    let records = assign_road_conditions(&load_driving_log(file.path()).unwrap(), 42);
    assert_eq!(records.len(), 31);

    let engine = engine();
    let policy = SeededUniformDistance::new(7, 0.0, 100.0).unwrap();
    let report = Simulation::new().run(&engine, &records, &policy).unwrap();
    assert_eq!(report.rows.len(), 31);
    assert_eq!(report.failures, 1);
    assert_eq!(report.counts.total(), 30);
    assert_eq!(report.rows[30].error.as_ref().map(|e| e.code), Some(ErrorCode::InvalidInput));

    let again = Simulation::new().run(&engine, &records, &policy).unwrap();
    assert_eq!(report.counts, again.counts);

    let err = Simulation::new()
        .with_on_error(OnRowError::Abort)
        .run(&engine, &records, &FixedDistance(20.0))
        .unwrap_err();
    assert_eq!(err.context_field("row"), Some("31"));
}
