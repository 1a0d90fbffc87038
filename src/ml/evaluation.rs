//! Stratified resampling and classification metrics

use crate::error::{Result, TriageError};
use crate::ml::models::{ClassMetrics, CrossValidationScores, ModelMetrics};
use crate::models::SeverityLabel;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tracing::debug;

/// Row indices of each class, in ascending order
fn indices_by_class(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut by_class = vec![Vec::new(); SeverityLabel::COUNT];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }
    by_class
}

/// Stratified train/test split.
///
/// Each class contributes `floor(count * test_size)` shuffled rows to the test
/// side, so every class keeps at least one training row when `test_size < 1`.
/// Returned index lists are sorted.
pub fn stratified_split(
    labels: &[usize],
    test_size: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for mut members in indices_by_class(labels) {
        members.shuffle(rng);
        let n_test = (members.len() as f64 * test_size).floor() as usize;
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Number of folds usable for `labels`: `requested` capped by the smallest
/// class, or `None` when fewer than two folds remain.
pub fn effective_folds(labels: &[usize], requested: usize) -> Option<usize> {
    let smallest = indices_by_class(labels)
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0);
    let k = requested.min(smallest);
    (k >= 2).then_some(k)
}

/// Stratified k-fold: `(train, test)` index pairs, one per fold.
///
/// Members of each class are shuffled and dealt round-robin across folds.
pub fn stratified_kfold(
    labels: &[usize],
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(TriageError::Internal(format!(
            "k-fold needs at least 2 folds, got {}",
            k
        )));
    }

    let mut fold_of = vec![0usize; labels.len()];
    for mut members in indices_by_class(labels) {
        members.shuffle(rng);
        for (j, idx) in members.into_iter().enumerate() {
            fold_of[idx] = j % k;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            (train, test)
        })
        .collect())
}

/// Run `fit_predict(train, test)` on every stratified fold and collect scores.
///
/// The closure trains on `train` rows and returns predicted class indices for
/// `test` rows, in order.
pub fn cross_validate<F>(
    labels: &[usize],
    k: usize,
    rng: &mut StdRng,
    mut fit_predict: F,
) -> Result<CrossValidationScores>
where
    F: FnMut(&[usize], &[usize]) -> Result<Vec<usize>>,
{
    let folds = stratified_kfold(labels, k, rng)?;
    let mut accuracy_scores = Vec::with_capacity(k);
    let mut f1_scores = Vec::with_capacity(k);

    for (fold, (train, test)) in folds.iter().enumerate() {
        let predictions = fit_predict(train, test)?;
        let y_true: Vec<usize> = test.iter().map(|&i| labels[i]).collect();
        let metrics = calculate_metrics(&y_true, &predictions);

        debug!(
            fold,
            accuracy = metrics.accuracy,
            f1_macro = metrics.f1_score,
            "Cross-validation fold scored"
        );
        accuracy_scores.push(metrics.accuracy);
        f1_scores.push(metrics.f1_score);
    }

    let (accuracy_mean, accuracy_std) = mean_std(&accuracy_scores);
    let (f1_mean, f1_std) = mean_std(&f1_scores);

    Ok(CrossValidationScores {
        folds: k,
        accuracy_scores,
        f1_scores,
        accuracy_mean,
        accuracy_std,
        f1_mean,
        f1_std,
    })
}

/// Population mean and standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Accuracy, macro and weighted scores, per-class scores and confusion matrix
pub fn calculate_metrics(y_true: &[usize], y_pred: &[usize]) -> ModelMetrics {
    let n_samples = y_true.len();
    if n_samples == 0 {
        return ModelMetrics::new();
    }
    let n_classes = SeverityLabel::COUNT;

    let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t < n_classes && p < n_classes {
            confusion[[t, p]] += 1;
        }
    }

    let correct: usize = (0..n_classes).map(|c| confusion[[c, c]]).sum();
    let accuracy = correct as f64 / n_samples as f64;

    let mut per_class = HashMap::new();
    let mut macro_precision = 0.0;
    let mut macro_recall = 0.0;
    let mut macro_f1 = 0.0;
    let mut weighted_f1 = 0.0;

    for label in SeverityLabel::ALL {
        let c = label.index();
        let tp = confusion[[c, c]];
        let predicted: usize = (0..n_classes).map(|r| confusion[[r, c]]).sum();
        let support: usize = (0..n_classes).map(|p| confusion[[c, p]]).sum();

        let precision = if predicted > 0 {
            tp as f64 / predicted as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            tp as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        macro_precision += precision;
        macro_recall += recall;
        macro_f1 += f1;
        weighted_f1 += f1 * support as f64;

        per_class.insert(
            label.to_string(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    ModelMetrics {
        accuracy,
        precision: macro_precision / n_classes as f64,
        recall: macro_recall / n_classes as f64,
        f1_score: macro_f1 / n_classes as f64,
        f1_weighted: weighted_f1 / n_samples as f64,
        confusion_matrix: Some(confusion),
        per_class_metrics: per_class,
        n_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn labels(grave: usize, moderado: usize) -> Vec<usize> {
        let mut labels = vec![0; grave];
        labels.extend(vec![1; moderado]);
        labels
    }

    #[test]
    fn test_stratified_split_keeps_proportions() {
        let labels = labels(10, 20);
        let mut rng = StdRng::seed_from_u64(42);
        let (train, test) = stratified_split(&labels, 0.2, &mut rng);

        assert_eq!(test.len(), 6);
        assert_eq!(train.len(), 24);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 0).count(), 2);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 4);
    }

    #[test]
    fn test_stratified_split_tiny_dataset() {
        let labels = labels(1, 1);
        let mut rng = StdRng::seed_from_u64(42);
        let (train, test) = stratified_split(&labels, 0.2, &mut rng);

        assert_eq!(train, vec![0, 1]);
        assert!(test.is_empty());
    }

    #[test]
    fn test_stratified_split_is_seeded() {
        let labels = labels(15, 15);
        let a = stratified_split(&labels, 0.3, &mut StdRng::seed_from_u64(7));
        let b = stratified_split(&labels, 0.3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_effective_folds() {
        assert_eq!(effective_folds(&labels(10, 10), 5), Some(5));
        assert_eq!(effective_folds(&labels(3, 10), 5), Some(3));
        assert_eq!(effective_folds(&labels(1, 10), 5), None);
        assert_eq!(effective_folds(&labels(10, 10), 0), None);
    }

    #[test]
    fn test_stratified_kfold_partitions_rows() {
        let labels = labels(6, 9);
        let mut rng = StdRng::seed_from_u64(1);
        let folds = stratified_kfold(&labels, 3, &mut rng).unwrap();

        assert_eq!(folds.len(), 3);
        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..15).collect::<Vec<_>>());

        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 15);
            assert_eq!(test.iter().filter(|&&i| labels[i] == 0).count(), 2);
            assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 3);
        }
    }

    #[test]
    fn test_cross_validate_perfect_predictor() {
        let labels = labels(4, 4);
        let mut rng = StdRng::seed_from_u64(3);
        let scores = cross_validate(&labels, 2, &mut rng, |_, test| {
            Ok(test.iter().map(|&i| labels[i]).collect())
        })
        .unwrap();

        assert_eq!(scores.folds, 2);
        assert_eq!(scores.accuracy_mean, 1.0);
        assert_eq!(scores.accuracy_std, 0.0);
        assert_eq!(scores.f1_mean, 1.0);
    }

    #[test]
    fn test_mean_std_population() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_eq!(mean, 2.0);
        assert_eq!(std, 1.0);
    }

    #[test]
    fn test_calculate_metrics() {
        let y_true = vec![0, 0, 0, 1, 1];
        let y_pred = vec![0, 0, 1, 1, 1];
        let metrics = calculate_metrics(&y_true, &y_pred);

        assert!((metrics.accuracy - 0.8).abs() < 1e-12);
        let confusion = metrics.confusion_matrix.unwrap();
        assert_eq!(confusion[[0, 0]], 2);
        assert_eq!(confusion[[0, 1]], 1);
        assert_eq!(confusion[[1, 1]], 2);

        let grave = &metrics.per_class_metrics["GRAVE"];
        assert_eq!(grave.support, 3);
        assert!((grave.precision - 1.0).abs() < 1e-12);
        assert!((grave.recall - 2.0 / 3.0).abs() < 1e-12);

        let moderado = &metrics.per_class_metrics["MODERADO"];
        assert!((moderado.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.f1_score - 0.8).abs() < 1e-12);
        assert!((metrics.f1_weighted - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_metrics_empty() {
        let metrics = calculate_metrics(&[], &[]);
        assert_eq!(metrics.n_samples, 0);
        assert!(metrics.confusion_matrix.is_none());
    }
}
