//! 分類レポート（ラベル別・マクロ・加重平均）。
use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy)]
struct LabelStats {
    true_positive: usize,
    false_positive: usize,
    false_negative: usize,
    support: usize, // 正解データに含まれるそのラベルの個数
}

impl LabelStats {
    fn scores(self) -> LabelScores {
        let precision = ratio(self.true_positive, self.true_positive + self.false_positive);
        let recall = ratio(self.true_positive, self.true_positive + self.false_negative);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        LabelScores {
            precision,
            recall,
            f1_score,
            support: self.support,
        }
    }
}

/// 分母が 0 の指標は 0 とする。
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// 1ラベル（または平均）ぶんの指標。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// `report.json` の内容。ラベル名のキーに加えて
/// `accuracy`・`macro avg`・`weighted avg` を持つ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub per_label: BTreeMap<String, LabelScores>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: LabelScores,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: LabelScores,
}

impl ClassificationReport {
    /// 正解ラベルと予測ラベルの組からレポートを作る。
    ///
    /// 対象ラベルは正解と予測の和集合（ソート済み）。
    ///
    /// # Errors
    /// 2つの列の長さが異なる場合はエラーを返す。
    pub fn from_predictions<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> Result<Self> {
        ensure!(
            y_true.len() == y_pred.len(),
            "y_true/y_pred length mismatch: {} vs {}",
            y_true.len(),
            y_pred.len()
        );

        let mut per_label: BTreeMap<String, LabelStats> = BTreeMap::new();
        let mut correct = 0;
        for (expected, predicted) in y_true.iter().zip(y_pred) {
            let (expected, predicted) = (expected.as_ref(), predicted.as_ref());
            per_label.entry(expected.to_string()).or_default().support += 1;
            if expected == predicted {
                correct += 1;
                per_label.entry(expected.to_string()).or_default().true_positive += 1;
            } else {
                per_label.entry(expected.to_string()).or_default().false_negative += 1;
                per_label.entry(predicted.to_string()).or_default().false_positive += 1;
            }
        }

        let total = y_true.len();
        let per_label: BTreeMap<String, LabelScores> = per_label
            .into_iter()
            .map(|(label, stats)| (label, stats.scores()))
            .collect();

        let count = per_label.len().max(1) as f64;
        let weight_total = total.max(1) as f64;
        let mut macro_avg = LabelScores {
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            support: total,
        };
        let mut weighted_avg = macro_avg;
        for scores in per_label.values() {
            let weight = scores.support as f64 / weight_total;
            macro_avg.precision += scores.precision / count;
            macro_avg.recall += scores.recall / count;
            macro_avg.f1_score += scores.f1_score / count;
            weighted_avg.precision += scores.precision * weight;
            weighted_avg.recall += scores.recall * weight;
            weighted_avg.f1_score += scores.f1_score * weight;
        }

        Ok(Self {
            per_label,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
        })
    }
}
