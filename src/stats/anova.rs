//! One-way ANOVA across groups (SciPy `f_oneway` semantics).
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::{Outcome, SkipReason};

/// Groups need this many observations to take part.
pub const MIN_GROUP_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnovaResult {
    pub n_groups: usize,
    pub f_stat: f64,
    pub p_value: f64,
}

/// One-way ANOVA over the groups holding at least [`MIN_GROUP_SIZE`]
/// finite values.
///
/// Fewer than two such groups → `InsufficientData`. When every group is
/// constant the F statistic is infinite (p = 0) if the group means differ and
/// NaN otherwise.
pub fn one_way_anova<G: AsRef<[f64]>>(groups: &[G]) -> Outcome<AnovaResult> {
    let usable: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| g.as_ref().iter().copied().filter(|v| v.is_finite()).collect::<Vec<f64>>())
        .filter(|g| g.len() >= MIN_GROUP_SIZE)
        .collect();
    let k = usable.len();
    if k < 2 {
        return Err(SkipReason::InsufficientData { test: "anova", needed: 2, got: k });
    }

    let n: usize = usable.iter().map(Vec::len).sum();
    let grand = usable.iter().flatten().sum::<f64>() / n as f64;
    let (mut ss_between, mut ss_within) = (0.0, 0.0);
    for g in &usable {
        let m = g.iter().sum::<f64>() / g.len() as f64;
        ss_between += g.len() as f64 * (m - grand) * (m - grand);
        ss_within += g.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    }
    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;

    let (f_stat, p_value) = if ms_within == 0.0 {
        if ms_between > 0.0 { (f64::INFINITY, 0.0) } else { (f64::NAN, f64::NAN) }
    } else {
        let f = ms_between / ms_within;
        let p = match FisherSnedecor::new(df_between, df_within) {
            Ok(dist) => 1.0 - dist.cdf(f),
            Err(_) => f64::NAN,
        };
        (f, p)
    };

    Ok(AnovaResult { n_groups: k, f_stat, p_value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn separated_groups_are_significant() {
        let r = one_way_anova(&[vec![0.9, 0.91, 0.89], vec![0.5, 0.52, 0.48]]).unwrap();
        assert_eq!(r.n_groups, 2);
        assert!(r.p_value < 0.01, "p = {}", r.p_value);
    }

    #[test]
    fn matches_textbook_f() {
        // Means 2, 4, 6; within SS 6 over 6 df; between SS 24 over 2 df → F = 12.
        let r = one_way_anova(&[[1.0, 2.0, 3.0], [3.0, 4.0, 5.0], [5.0, 6.0, 7.0]]).unwrap();
        assert_abs_diff_eq!(r.f_stat, 12.0, epsilon = 1e-12);
        assert!(r.p_value > 0.005 && r.p_value < 0.01);
    }

    #[test]
    fn small_groups_dropped() {
        let r = one_way_anova(&[vec![1.0], vec![0.1, 0.2]]);
        assert_eq!(r, Err(SkipReason::InsufficientData { test: "anova", needed: 2, got: 1 }));
    }

    #[test]
    fn zero_within_variance() {
        let r = one_way_anova(&[vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
        assert_eq!(r.p_value, 0.0);
        assert!(r.f_stat.is_infinite());
    }
}
