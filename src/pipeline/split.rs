//! Stratified train/test splitting and k-fold assignment

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use super::error::{BenchError, Result};
use super::target::target_labels;

/// One cross-validation fold, both index lists ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Row indices of each class (0 first), in row order
fn class_rows(labels: &[f64]) -> [Vec<usize>; 2] {
    let mut rows: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &y) in labels.iter().enumerate() {
        rows[usize::from(y >= 0.5)].push(i);
    }
    rows
}

/// Split row indices into `(train, test)` keeping class proportions.
///
/// `n_test = ceil(test_fraction * n)`, shared between the classes by largest
/// remainder. Each class is shuffled with its own draw from one seeded
/// generator.
pub fn stratified_split_indices(
    labels: &[f64],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(BenchError::value(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n = labels.len();
    let rows = class_rows(labels);
    for (class, members) in rows.iter().enumerate() {
        if members.len() < 2 {
            return Err(BenchError::value(format!(
                "class {} has {} row(s); stratified splitting needs at least 2 per class",
                class,
                members.len()
            )));
        }
    }

    let n_test = ((test_fraction * n as f64) - 1e-9).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(BenchError::value(format!(
            "test fraction {} leaves an empty partition for {} rows",
            test_fraction, n
        )));
    }

    // largest-remainder allocation of n_test across classes
    let quotas: Vec<f64> = rows
        .iter()
        .map(|members| members.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let mut remaining = n_test - alloc.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &class in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if alloc[class] < rows[class].len() {
            alloc[class] += 1;
            remaining -= 1;
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (members, &k) in rows.iter().zip(&alloc) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        test.extend_from_slice(&shuffled[..k]);
        train.extend_from_slice(&shuffled[k..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(BenchError::value("stratified split produced an empty partition"));
    }

    train.sort_unstable();
    test.sort_unstable();
    tracing::debug!(
        train = train.len(),
        test = test.len(),
        test_negatives = alloc[0],
        test_positives = alloc[1],
        "stratified split"
    );
    Ok((train, test))
}

/// Select rows of `df` by index, keeping the given order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Stratified train/test split of a labeled table
pub fn stratified_split(
    df: &DataFrame,
    target: &str,
    test_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let labels = target_labels(df, target)?;
    let (train, test) = stratified_split_indices(&labels, test_fraction, seed)?;
    Ok((take_rows(df, &train)?, take_rows(df, &test)?))
}

/// Assign rows to `folds` stratified folds.
///
/// Rows ordered by class are dealt round-robin to the folds, which fixes how
/// many rows of each class every fold receives; each class's rows (shuffled
/// when a seed is given) are then handed out contiguously in fold order.
/// Fold sizes differ by at most one.
pub fn stratified_k_fold(
    labels: &[f64],
    folds: usize,
    shuffle_seed: Option<u64>,
) -> Result<Vec<Fold>> {
    let n = labels.len();
    if folds < 2 {
        return Err(BenchError::value(format!(
            "number of folds must be at least 2, got {}",
            folds
        )));
    }
    if folds > n {
        return Err(BenchError::value(format!(
            "cannot make {} folds from {} rows",
            folds, n
        )));
    }

    let mut rows = class_rows(labels);
    for (class, members) in rows.iter().enumerate() {
        if !members.is_empty() && members.len() < folds {
            tracing::warn!(
                class,
                members = members.len(),
                folds,
                "class has fewer rows than folds; some folds will not contain it"
            );
        }
    }

    if let Some(seed) = shuffle_seed {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for members in rows.iter_mut() {
            members.shuffle(&mut rng);
        }
    }

    // per-class allocation from dealing the class-sorted sequence
    let mut alloc = vec![[0usize; 2]; folds];
    let mut position = 0;
    for (class, members) in rows.iter().enumerate() {
        for _ in members {
            alloc[position % folds][class] += 1;
            position += 1;
        }
    }

    let mut assignment = vec![0usize; n];
    for (class, members) in rows.iter().enumerate() {
        let mut cursor = 0;
        for (fold, counts) in alloc.iter().enumerate() {
            for &row in &members[cursor..cursor + counts[class]] {
                assignment[row] = fold;
            }
            cursor += counts[class];
        }
    }

    Ok((0..folds)
        .map(|fold| {
            let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                (0..n).partition(|&i| assignment[i] == fold);
            Fold {
                train_indices,
                test_indices,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, positives: usize) -> Vec<f64> {
        (0..n).map(|i| if i < positives { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_split_sizes_and_balance() {
        let y = labels(1000, 100);
        let (train, test) = stratified_split_indices(&y, 0.3, 42).unwrap();
        assert_eq!(test.len(), 300);
        assert_eq!(train.len(), 700);
        let test_pos = test.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(test_pos, 30);
    }

    #[test]
    fn test_split_is_disjoint_and_reproducible() {
        let y = labels(97, 13);
        let (train, test) = stratified_split_indices(&y, 0.25, 7).unwrap();
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..97).collect::<Vec<_>>());

        let again = stratified_split_indices(&y, 0.25, 7).unwrap();
        assert_eq!(again, (train, test));
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let y = labels(10, 5);
        assert!(stratified_split_indices(&y, 0.0, 1).is_err());
        assert!(stratified_split_indices(&y, 1.0, 1).is_err());
        assert!(stratified_split_indices(&y, -0.2, 1).is_err());
    }

    #[test]
    fn test_split_rejects_tiny_class() {
        let y = labels(10, 1);
        let err = stratified_split_indices(&y, 0.3, 1).unwrap_err();
        assert!(err.to_string().contains("class 1"));
    }

    #[test]
    fn test_k_fold_sizes_and_coverage() {
        let y = labels(103, 11);
        let folds = stratified_k_fold(&y, 5, Some(42)).unwrap();
        assert_eq!(folds.len(), 5);

        let mut covered = Vec::new();
        for fold in &folds {
            assert!(fold.test_indices.len() == 20 || fold.test_indices.len() == 21);
            assert_eq!(fold.train_indices.len() + fold.test_indices.len(), 103);
            covered.extend_from_slice(&fold.test_indices);
        }
        covered.sort_unstable();
        assert_eq!(covered, (0..103).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_stratifies_classes() {
        let y = labels(100, 10);
        for fold in stratified_k_fold(&y, 5, None).unwrap() {
            let positives = fold.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn test_k_fold_rejects_bad_counts() {
        let y = labels(4, 2);
        assert!(stratified_k_fold(&y, 1, None).is_err());
        assert!(stratified_k_fold(&y, 5, None).is_err());
    }

    #[test]
    fn test_take_rows() {
        let df = df! { "a" => [10i32, 20, 30] }.unwrap();
        let out = take_rows(&df, &[2, 0]).unwrap();
        let values: Vec<Option<i32>> = out.column("a").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(30), Some(10)]);
    }
}
