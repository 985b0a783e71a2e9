//! 再現可能な学習／評価データ分割。
use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::PipelineError;

/// 分割後のインデックス（元データ上の位置）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// ラベル列をシード付きで学習用と評価用に分ける。
///
/// 全ラベルが2件以上ある場合は層化分割し、各ラベルが評価セットに比例配分される
/// （最大剰余法、各ラベル最低1件は学習側に残す）。評価セットの件数は
/// `ceil(n * test_size)` で、どちらの集合も空にはならない。
///
/// # Errors
/// サンプルが2件未満の場合は [`PipelineError::EmptyDataset`] を返す。
pub fn train_test_split(
    labels: &[String],
    test_size: f64,
    seed: u64,
) -> Result<SplitIndices, PipelineError> {
    let n = labels.len();
    if n < 2 {
        return Err(PipelineError::EmptyDataset(format!(
            "need at least 2 samples to split, found {n}"
        )));
    }
    let n_test = test_count(n, test_size);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        groups.entry(label.as_str()).or_default().push(index);
    }
    let stratified = groups.values().all(|members| members.len() >= 2);

    let (mut train, mut test) = if stratified {
        stratified_split(groups, n, n_test, &mut rng)
    } else {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let train = order.split_off(n_test);
        (train, order)
    };

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(SplitIndices {
        train,
        test,
        stratified,
    })
}

fn test_count(n: usize, test_size: f64) -> usize {
    let raw = (n as f64 * test_size.clamp(0.0, 1.0)).ceil() as usize;
    raw.clamp(1, n - 1)
}

fn stratified_split(
    groups: BTreeMap<&str, Vec<usize>>,
    n: usize,
    n_test: usize,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    // (floor share, remainder, capacity) per label
    let mut allocation: Vec<(usize, f64, usize)> = groups
        .values()
        .map(|members| {
            let exact = members.len() as f64 * n_test as f64 / n as f64;
            let capacity = members.len() - 1;
            let floor = (exact.floor() as usize).min(capacity);
            (floor, exact - floor as f64, capacity)
        })
        .collect();

    let mut assigned: usize = allocation.iter().map(|(floor, _, _)| floor).sum();
    let mut order: Vec<usize> = (0..allocation.len()).collect();
    order.sort_by(|&a, &b| allocation[b].1.total_cmp(&allocation[a].1));
    while assigned < n_test {
        let mut progressed = false;
        for &slot in &order {
            if assigned == n_test {
                break;
            }
            let (take, _, capacity) = &mut allocation[slot];
            if *take < *capacity {
                *take += 1;
                assigned += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (mut members, (take, _, _)) in groups.into_values().zip(allocation) {
        members.shuffle(rng);
        let rest = members.split_off(take);
        test.extend(members);
        train.extend(rest);
    }
    (train, test)
}
