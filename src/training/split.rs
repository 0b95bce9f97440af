//! Seeded stratified hold-out split and k-fold partitioning.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of one train/test partition, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn shuffled_classes(labels: &[u8], rng: &mut ChaCha8Rng) -> [Vec<usize>; 2] {
    let mut classes: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &y) in labels.iter().enumerate() {
        classes[usize::from(y == 1)].push(i);
    }
    for class in classes.iter_mut() {
        class.shuffle(rng);
    }
    classes
}

/// Hold out `ceil(n * test_fraction)` rows, allocated across classes in
/// proportion to their size (largest remainder).
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Split {
    let n = labels.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let classes = shuffled_classes(labels, &mut rng);

    let n_test = ((n as f64 * test_fraction.clamp(0.0, 1.0)).ceil() as usize).min(n.saturating_sub(1));
    let quotas: Vec<f64> = classes
        .iter()
        .map(|c| if n == 0 { 0.0 } else { n_test as f64 * c.len() as f64 / n as f64 })
        .collect();
    let mut alloc: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let mut remaining = n_test - alloc.iter().sum::<usize>();
    let mut by_remainder: Vec<usize> = (0..classes.len()).collect();
    by_remainder.sort_by(|&a, &b| (quotas[b] - quotas[b].floor()).total_cmp(&(quotas[a] - quotas[a].floor())));
    for &c in by_remainder.iter().cycle().take(classes.len() * 2) {
        if remaining == 0 {
            break;
        }
        if alloc[c] < classes[c].len() {
            alloc[c] += 1;
            remaining -= 1;
        }
    }

    let mut split = Split {
        train: Vec::with_capacity(n - n_test),
        test: Vec::with_capacity(n_test),
    };
    for (class, &k) in classes.iter().zip(&alloc) {
        split.test.extend_from_slice(&class[..k]);
        split.train.extend_from_slice(&class[k..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    split
}

/// `k` stratified folds; each row lands in exactly one test fold.
pub fn stratified_kfold(labels: &[u8], k: usize, seed: u64) -> Vec<Split> {
    let k = k.max(1);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let classes = shuffled_classes(labels, &mut rng);

    let mut fold_of = vec![0usize; labels.len()];
    let mut next = 0usize;
    for class in &classes {
        for &i in class {
            fold_of[i] = next % k;
            next += 1;
        }
    }

    (0..k)
        .map(|f| {
            let (test, train): (Vec<usize>, Vec<usize>) = (0..labels.len()).partition(|&i| fold_of[i] == f);
            Split { train, test }
        })
        .collect()
}
