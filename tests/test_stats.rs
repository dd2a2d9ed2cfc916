use approx::assert_abs_diff_eq;
use sleepcca::analysis::time_mode;
use sleepcca::config::TimeCcaConfig;
use sleepcca::stats::{adf, histogram_entropy, kpss, one_way_anova, Moments};
use sleepcca::{SkipReason, SleepStage, TimeResolvedSample};

#[test]
fn uniform_histogram_entropy_is_ln_20() {
    // Two values at the centre of each of the 20 bins.
    let x: Vec<f64> = (0..40).map(|i| ((i % 20) as f64 + 0.5) / 20.0).collect();
    assert_abs_diff_eq!(histogram_entropy(&x), 20f64.ln(), epsilon = 1e-9);
}

#[test]
fn entropy_never_exceeds_ln_20() {
    let x: Vec<f64> = (0..997).map(|i| (i as f64 * 0.618_033_988_7).fract()).collect();
    let h = histogram_entropy(&x);
    assert!(h <= 20f64.ln() + 1e-12 && h > 2.9);
}

#[test]
fn separated_stage_means_are_significant() {
    let r = one_way_anova(&[vec![0.9, 0.91, 0.89], vec![0.5, 0.52, 0.48]]).unwrap();
    assert_eq!(r.n_groups, 2);
    assert!(r.p_value < 0.01, "p = {}", r.p_value);
}

#[test]
fn anova_with_one_group_is_insufficient() {
    let err = one_way_anova(&[vec![0.9, 0.91, 0.89], vec![0.5]]).unwrap_err();
    assert_eq!(err, SkipReason::InsufficientData { test: "anova", needed: 2, got: 1 });
}

#[test]
fn moments_of_symmetric_sample() {
    let m = Moments::of(&[1.0, 2.0, 3.0, 4.0, 5.0], 1);
    assert_abs_diff_eq!(m.mean, 3.0);
    assert_abs_diff_eq!(m.std, 2.5_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(m.skewness, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(m.kurtosis, -1.3, epsilon = 1e-12);
    assert_eq!(m.count, 5);
}

#[test]
fn stationarity_tests_reject_short_series() {
    let x = [0.5; 9];
    assert!(adf(&x).is_err());
    assert!(kpss(&x).is_err());
}

fn series(subject: &str, stage: SleepStage, n: usize, level: f64) -> Vec<TimeResolvedSample> {
    (0..n)
        .map(|i| TimeResolvedSample {
            time_sec: i as f64 * 15.0,
            cca_corr1: level + 0.02 * ((i * 37 % 11) as f64 / 11.0 - 0.5),
            cca_corr2: level / 2.0 + 0.02 * ((i * 53 % 13) as f64 / 13.0 - 0.5),
            subject: subject.to_string(),
            stage,
        })
        .collect()
}

#[test]
fn time_analysis_tables_cover_every_series() {
    let mut rows = series("a", SleepStage::N2, 40, 0.8);
    rows.extend(series("a", SleepStage::R, 12, 0.4));
    rows.extend(series("b", SleepStage::N2, 30, 0.78));
    rows.extend(series("b", SleepStage::R, 5, 0.42));

    let cfg = TimeCcaConfig { sampled_subjects: 1, ..TimeCcaConfig::default() };
    let out = time_mode::analyze(&rows, &cfg);

    assert_eq!(out.stagewise_summary.len(), 2);
    assert_eq!(out.stagewise_summary[0].stage, SleepStage::N2);
    assert_eq!(out.stagewise_summary[0].cca_corr1_count, 70);
    assert_eq!(out.entropy.len(), 4);
    // b/R has 5 windows: too short for ADF/KPSS
    assert_eq!(out.stationarity.len(), 6);
    assert_eq!(out.tests.skipped["insufficient_data"], 2);
    assert_eq!(out.anova.len(), 2);
    assert!(out.anova[0].p_value < 0.01);

    let subjects: std::collections::BTreeSet<&str> = out.subset.iter().map(|r| r.subject.as_str()).collect();
    assert_eq!(subjects.len(), 1);
}
