use sleepcca::epoch::seconds_to_sample;
use sleepcca::{window_count, window_starts, Epoch, SkipReason, SleepStage};

fn epoch(start: f64, stop: f64) -> Epoch {
    Epoch { stage: SleepStage::N2, start_sec: start, stop_sec: stop }
}

#[test]
fn sample_span_scenario() {
    let sp = epoch(180.0, 420.0).to_sample_span(100.0, 1_000_000).unwrap();
    assert_eq!((sp.start, sp.stop), (18_000, 42_000));
}

#[test]
fn rounding_is_to_nearest_not_truncation() {
    // 0.0199 s × 256 Hz = 5.09 → 5; 0.0215 s × 256 Hz = 5.504 → 6
    assert_eq!(seconds_to_sample(0.0199, 256.0), 5);
    assert_eq!(seconds_to_sample(0.0215, 256.0), 6);
    assert_eq!(seconds_to_sample(2.5, 1.0), 2);
    assert_eq!(seconds_to_sample(3.5, 1.0), 4);
}

#[test]
fn stop_is_clipped_to_recording_length() {
    let sp = epoch(100.0, 200.0).to_sample_span(10.0, 1500).unwrap();
    assert_eq!((sp.start, sp.stop), (1000, 1500));
}

#[test]
fn spans_always_inside_recording_or_dropped() {
    let total = 5_000;
    for start in (0..800).step_by(13) {
        for len in [1, 7, 50, 300] {
            let e = epoch(start as f64 * 0.7, start as f64 * 0.7 + len as f64 * 0.3);
            match e.to_sample_span(10.0, total) {
                Ok(sp) => assert!(sp.start < sp.stop && sp.stop <= total),
                Err(r) => assert!(matches!(r, SkipReason::SampleRangeInvalid { .. })),
            }
        }
    }
}

#[test]
fn epoch_past_end_is_invalid() {
    let r = epoch(600.0, 630.0).to_sample_span(10.0, 5_000);
    assert!(matches!(r, Err(SkipReason::SampleRangeInvalid { start: 6000, stop: 5000, .. })));
}

#[test]
fn window_count_formula() {
    for (d, w, s) in [(90.0_f64, 30.0_f64, 15.0_f64), (31.0, 30.0, 15.0), (29.9, 30.0, 15.0), (300.0, 30.0, 30.0), (120.0, 20.0, 7.0)] {
        let expected = if d >= w { ((d - w) / s).floor() as usize + 1 } else { 0 };
        assert_eq!(window_count(d, w, s), expected, "D={d} W={w} S={s}");
    }
    assert_eq!(window_count(90.0, 30.0, 15.0), 5);
}

#[test]
fn window_starts_do_not_drift() {
    let e = epoch(1000.0, 1000.0 + 0.1 * 3000.0 + 30.0);
    let starts: Vec<f64> = window_starts(&e, 30.0, 0.1).collect();
    assert_eq!(starts.len(), 3001);
    assert_eq!(starts[3000], 1000.0 + 3000.0 * 0.1);
    assert!(starts.last().copied().unwrap() + 30.0 <= e.stop_sec + 1e-9);
}
