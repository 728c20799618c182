//! Two-sample distribution distances used by the scorer.
//!
//! Every function here is pure and deterministic for identical inputs. Numeric
//! inputs are expected to be finite; the scorer filters before calling in.

use std::collections::BTreeMap;

use crate::drift::MAX_BINS;

/// Floor applied to bucket proportions so empty buckets never produce `ln(0)`.
pub const PSI_FLOOR: f64 = 1e-4;

/// `Σ (a − e) · ln(a / e)` over matching proportion vectors.
pub fn population_stability_index(expected: &[f64], actual: &[f64]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(e, a)| {
            let e = e.max(PSI_FLOOR);
            let a = a.max(PSI_FLOOR);
            (a - e) * (a / e).ln()
        })
        .sum::<f64>()
        .max(0.0)
}

/// Interior nearest-rank quantiles of a sorted sample, deduplicated.
///
/// Buckets are `(-∞, e1], (e1, e2], …, (ek, +∞)`, so a constant sample still
/// yields two buckets around its single value.
pub fn quantile_edges(sorted: &[f64], bins: usize) -> Vec<f64> {
    if sorted.is_empty() || bins < 2 {
        return Vec::new();
    }
    let n = sorted.len();
    let mut edges: Vec<f64> = (1..bins)
        .map(|i| {
            let rank = ((i as f64 / bins as f64) * n as f64).ceil() as usize;
            sorted[rank.saturating_sub(1).min(n - 1)]
        })
        .collect();
    edges.dedup();
    edges
}

pub fn bucket_proportions(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let mut counts = vec![0usize; edges.len() + 1];
    for value in values {
        let idx = edges.partition_point(|edge| edge < value);
        counts[idx] += 1;
    }
    proportions(&counts, values.len())
}

pub fn numeric_psi(baseline: &[f64], current: &[f64], bins: usize) -> f64 {
    let sorted = sorted_copy(baseline);
    let edges = quantile_edges(&sorted, bins.clamp(2, MAX_BINS));
    let expected = bucket_proportions(baseline, &edges);
    let actual = bucket_proportions(current, &edges);
    population_stability_index(&expected, &actual)
}

/// Proportions of each label over the union of both samples, in label order.
/// A label absent from one side gets a zero share there.
pub fn category_proportions(baseline: &[String], current: &[String]) -> (Vec<f64>, Vec<f64>) {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for label in baseline {
        counts.entry(label.as_str()).or_default().0 += 1;
    }
    for label in current {
        counts.entry(label.as_str()).or_default().1 += 1;
    }
    let base_counts: Vec<usize> = counts.values().map(|(b, _)| *b).collect();
    let curr_counts: Vec<usize> = counts.values().map(|(_, c)| *c).collect();
    (
        proportions(&base_counts, baseline.len()),
        proportions(&curr_counts, current.len()),
    )
}

pub fn categorical_psi(baseline: &[String], current: &[String]) -> f64 {
    let (expected, actual) = category_proportions(baseline, current);
    population_stability_index(&expected, &actual)
}

/// Base-2 Jensen–Shannon distance, in `[0, 1]`.
pub fn jensen_shannon_distance(p: &[f64], q: &[f64]) -> f64 {
    let kl_to_mid = |x: f64, m: f64| if x > 0.0 { x * (x / m).log2() } else { 0.0 };
    let divergence: f64 = p
        .iter()
        .zip(q)
        .map(|(p, q)| {
            let m = 0.5 * (p + q);
            0.5 * kl_to_mid(*p, m) + 0.5 * kl_to_mid(*q, m)
        })
        .sum();
    divergence.clamp(0.0, 1.0).sqrt()
}

/// First Wasserstein distance between two empirical distributions.
pub fn wasserstein_distance(baseline: &[f64], current: &[f64]) -> f64 {
    let a = sorted_copy(baseline);
    let b = sorted_copy(current);
    let mut all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(f64::total_cmp);

    all.windows(2)
        .map(|pair| {
            let gap = pair[1] - pair[0];
            (ecdf(&a, pair[0]) - ecdf(&b, pair[0])).abs() * gap
        })
        .sum()
}

/// Two-sample Kolmogorov–Smirnov statistic `D`.
pub fn ks_statistic(baseline: &[f64], current: &[f64]) -> f64 {
    let a = sorted_copy(baseline);
    let b = sorted_copy(current);
    a.iter()
        .chain(b.iter())
        .map(|x| (ecdf(&a, *x) - ecdf(&b, *x)).abs())
        .fold(0.0, f64::max)
}

pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn ecdf(sorted: &[f64], x: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.partition_point(|v| *v <= x) as f64 / sorted.len() as f64
}

fn proportions(counts: &[usize], total: usize) -> Vec<f64> {
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .iter()
        .map(|c| *c as f64 / total as f64)
        .collect()
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn psi_is_zero_for_identical_samples() {
        let sample: Vec<f64> = (0..200).map(|i| (i % 37) as f64 * 1.5).collect();
        assert!(numeric_psi(&sample, &sample, 10).abs() < 1e-12);
        let hotels = labels(&["Resort", "City", "City", "Resort", "City"]);
        assert!(categorical_psi(&hotels, &hotels).abs() < 1e-12);
    }

    #[test]
    fn psi_grows_with_the_shift() {
        let baseline: Vec<f64> = (0..100).map(f64::from).collect();
        let small: Vec<f64> = baseline.iter().map(|v| v + 5.0).collect();
        let large: Vec<f64> = baseline.iter().map(|v| v + 40.0).collect();
        let disjoint: Vec<f64> = baseline.iter().map(|v| v + 1_000.0).collect();

        let s = numeric_psi(&baseline, &small, 10);
        let l = numeric_psi(&baseline, &large, 10);
        let d = numeric_psi(&baseline, &disjoint, 10);
        assert!(s > 0.0);
        assert!(l > s, "{l} <= {s}");
        assert!(d > l, "{d} <= {l}");
    }

    #[test]
    fn constant_baseline_still_buckets() {
        let baseline = vec![0.0; 50];
        let current = vec![100.0; 50];
        assert_eq!(quantile_edges(&baseline, 10), vec![0.0]);
        assert!(numeric_psi(&baseline, &current, 10) > 0.05);
        assert!(numeric_psi(&baseline, &baseline, 10).abs() < 1e-12);
    }

    #[test]
    fn absent_categories_count_as_zero_frequency() {
        let (base, curr) = category_proportions(&labels(&["A", "A", "B"]), &labels(&["C"]));
        assert_eq!(base.len(), 3);
        assert_eq!(curr, vec![0.0, 0.0, 1.0]);
        assert!(categorical_psi(&labels(&["A", "A", "B"]), &labels(&["C"])) > 1.0);
    }

    #[test]
    fn jensen_shannon_is_bounded() {
        assert!(jensen_shannon_distance(&[0.5, 0.5], &[0.5, 0.5]).abs() < 1e-12);
        let disjoint = jensen_shannon_distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((disjoint - 1.0).abs() < 1e-12);
        let partial = jensen_shannon_distance(&[0.7, 0.3], &[0.4, 0.6]);
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn wasserstein_matches_hand_computed_values() {
        assert!((wasserstein_distance(&[0.0, 1.0], &[1.0, 2.0]) - 1.0).abs() < 1e-12);
        assert!(wasserstein_distance(&[3.0, 1.0, 2.0], &[1.0, 2.0, 3.0]).abs() < 1e-12);
        assert!((wasserstein_distance(&[0.0], &[100.0]) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn ks_statistic_spans_zero_to_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(ks_statistic(&a, &a), 0.0);
        assert_eq!(ks_statistic(&a, &[10.0, 11.0]), 1.0);
        let half = ks_statistic(&[1.0, 2.0], &[2.0, 3.0]);
        assert!((half - 0.5).abs() < 1e-12);
    }

    #[test]
    fn population_std_of_constant_is_zero() {
        assert_eq!(population_std(&[4.0, 4.0, 4.0]), 0.0);
        assert!((population_std(&[10.0, 11.0, 12.0]) - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn oversized_bin_counts_are_capped() {
        let baseline: Vec<f64> = (0..50).map(f64::from).collect();
        let score = numeric_psi(&baseline, &baseline, usize::MAX);
        assert!(score.abs() < 1e-12);
    }
}
