//! ダッシュボード向けの集計値。
//!
//! アーティファクトが無い・壊れている・空の場合は固定のフォールバック値を返す。
//! 配信層はこのモジュールが失敗しないことを前提にしている。
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::{ArtifactLayout, artifacts};

/// 値の出所。フォールバック値かどうかを呼び出し側が区別できるようにする。
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Artifact(T),
    Fallback(T),
}

impl<T> Sourced<T> {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Artifact(value) | Self::Fallback(value) => value,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Artifact(value) | Self::Fallback(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpis {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

impl Kpis {
    pub const FALLBACK: Self = Self {
        precision: 0.818,
        recall: 0.888,
        f1: 0.851,
        accuracy: 0.842,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityShare {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadarMetric {
    pub metric: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub month: &'static str,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightsView {
    pub total_records: u64,
    pub unique_labels: u64,
    pub top_labels: Vec<LabelCount>,
    pub top_terms_global: Vec<String>,
}

const ENTITY_TOP_N: usize = 6;

const FALLBACK_ENTITIES: [(&str, i64); 5] = [
    ("NLP", 36),
    ("CV", 24),
    ("Robotics", 12),
    ("Bioinformatics", 18),
    ("Security", 10),
];

const FALLBACK_RADAR: [RadarMetric; 5] = [
    RadarMetric {
        metric: "Precision",
        value: 0.82,
    },
    RadarMetric {
        metric: "Recall",
        value: 0.89,
    },
    RadarMetric {
        metric: "F1",
        value: 0.85,
    },
    RadarMetric {
        metric: "Coverage",
        value: 0.78,
    },
    RadarMetric {
        metric: "Drift",
        value: 0.18,
    },
];

const TREND_SERIES: [TrendPoint; 6] = [
    TrendPoint {
        month: "Jan",
        value: 62,
    },
    TrendPoint {
        month: "Feb",
        value: 68,
    },
    TrendPoint {
        month: "Mar",
        value: 74,
    },
    TrendPoint {
        month: "Apr",
        value: 71,
    },
    TrendPoint {
        month: "May",
        value: 79,
    },
    TrendPoint {
        month: "Jun",
        value: 85,
    },
];

const FALLBACK_TOTAL_RECORDS: u64 = 10_000;
const FALLBACK_UNIQUE_LABELS: u64 = 12;
const FALLBACK_TOP_LABELS: [(&str, u64); 3] = [("cs.AI", 2100), ("cs.LG", 1800), ("cs.CL", 1600)];
const FALLBACK_TOP_TERMS: [&str; 6] = ["model", "learning", "neural", "network", "data", "training"];

/// アーティファクトを読み出してダッシュボード値を組み立てる。
#[derive(Debug, Clone)]
pub struct Dashboard {
    layout: ArtifactLayout,
}

impl Dashboard {
    #[must_use]
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// precision / recall / f1 / accuracy。
    ///
    /// 要約とレポートはトランスフォーマー版（`hf_*`）を優先する。
    #[must_use]
    pub fn kpis(&self) -> Sourced<Kpis> {
        let summary = read_present(&self.layout.hf_summary())
            .or_else(|| read_present(&self.layout.summary()));
        let report = read_present(&self.layout.hf_report())
            .or_else(|| read_present(&self.layout.report()));
        let (Some(summary), Some(report)) = (summary, report) else {
            return Sourced::Fallback(Kpis::FALLBACK);
        };

        let macro_avg = report.get("macro avg");
        let from_macro = |key: &str| macro_avg.and_then(|avg| avg.get(key)).and_then(Value::as_f64);
        let summary_f1 = summary
            .get("macro_f1")
            .and_then(Value::as_f64)
            .filter(|f1| *f1 != 0.0);

        match (
            from_macro("precision"),
            from_macro("recall"),
            summary_f1.or_else(|| from_macro("f1-score")),
            summary.get("accuracy").and_then(Value::as_f64),
        ) {
            (Some(precision), Some(recall), Some(f1), Some(accuracy)) => Sourced::Artifact(Kpis {
                precision,
                recall,
                f1,
                accuracy,
            }),
            _ => Sourced::Fallback(Kpis::FALLBACK),
        }
    }

    /// ラベル構成比（上位6件、百分率を偶数丸め）。
    #[must_use]
    pub fn entity_distribution(&self) -> Sourced<Vec<EntityShare>> {
        let Some(Value::Object(stats)) = read_present(&self.layout.label_stats()) else {
            return Sourced::Fallback(fallback_entities());
        };
        Sourced::Artifact(label_shares(&stats))
    }

    /// KPI から派生させたレーダーチャート値。
    #[must_use]
    pub fn radar_metrics(&self) -> Sourced<Vec<RadarMetric>> {
        match self.kpis() {
            Sourced::Fallback(_) => Sourced::Fallback(FALLBACK_RADAR.to_vec()),
            Sourced::Artifact(kpis) => Sourced::Artifact(vec![
                RadarMetric {
                    metric: "Precision",
                    value: kpis.precision,
                },
                RadarMetric {
                    metric: "Recall",
                    value: kpis.recall,
                },
                RadarMetric {
                    metric: "F1",
                    value: kpis.f1,
                },
                RadarMetric {
                    metric: "Coverage",
                    value: (kpis.recall + 0.02).min(1.0),
                },
                RadarMetric {
                    metric: "Drift",
                    value: (1.0 - kpis.accuracy).max(0.0),
                },
            ]),
        }
    }

    #[must_use]
    pub fn trend_series(&self) -> Vec<TrendPoint> {
        TREND_SERIES.to_vec()
    }

    /// データセット概要。項目ごとに個別にフォールバックする。
    #[must_use]
    pub fn insights(&self) -> Sourced<InsightsView> {
        let Some(Value::Object(insights)) = read_present(&self.layout.insights()) else {
            return Sourced::Fallback(InsightsView {
                total_records: FALLBACK_TOTAL_RECORDS,
                unique_labels: FALLBACK_UNIQUE_LABELS,
                top_labels: fallback_top_labels(),
                top_terms_global: fallback_top_terms(),
            });
        };

        let top_labels: Vec<LabelCount> = insights
            .get("top_labels")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_label_count).collect())
            .unwrap_or_default();
        let top_terms_global = insights
            .get("top_terms_global")
            .and_then(Value::as_array)
            .and_then(|terms| {
                terms
                    .iter()
                    .map(|term| term.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            });

        Sourced::Artifact(InsightsView {
            total_records: insights
                .get("total_records")
                .and_then(Value::as_u64)
                .unwrap_or(FALLBACK_TOTAL_RECORDS),
            unique_labels: insights
                .get("unique_labels")
                .and_then(Value::as_u64)
                .unwrap_or(FALLBACK_UNIQUE_LABELS),
            top_labels: if top_labels.is_empty() {
                fallback_top_labels()
            } else {
                top_labels
            },
            top_terms_global: top_terms_global.unwrap_or_else(fallback_top_terms),
        })
    }

    /// 読めない（フォールバックになる）アーティファクト名。
    #[must_use]
    pub fn missing_artifacts(&self) -> Vec<&'static str> {
        let layout = &self.layout;
        let checks: [(&'static str, bool); 4] = [
            (
                "summary.json",
                read_present(&layout.hf_summary()).is_some() || read_present(&layout.summary()).is_some(),
            ),
            (
                "report.json",
                read_present(&layout.hf_report()).is_some() || read_present(&layout.report()).is_some(),
            ),
            ("label_stats.json", read_present(&layout.label_stats()).is_some()),
            ("data_insights.json", read_present(&layout.insights()).is_some()),
        ];
        checks
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }
}

/// JSON を読み、空（null・空オブジェクト・空配列など）は無いものとして扱う。
fn read_present(path: &Path) -> Option<Value> {
    artifacts::read_json_lenient::<Value>(path).filter(is_truthy)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn label_shares(stats: &Map<String, Value>) -> Vec<EntityShare> {
    let mut counts: Vec<(&str, f64)> = stats
        .iter()
        .filter_map(|(label, count)| count.as_f64().map(|count| (label.as_str(), count)))
        .collect();
    let total = counts.iter().map(|(_, count)| count).sum::<f64>();
    let total = if total == 0.0 { 1.0 } else { total };

    // map keys are sorted, so the stable sort leaves ties in label order
    counts.sort_by(|a, b| b.1.total_cmp(&a.1));
    counts
        .into_iter()
        .take(ENTITY_TOP_N)
        .map(|(label, count)| EntityShare {
            label: label.to_string(),
            value: (count / total * 100.0).round_ties_even() as i64,
        })
        .collect()
}

/// `[label, count]` または `{"label", "count"}` を受け付ける。
fn parse_label_count(item: &Value) -> Option<LabelCount> {
    let (label, count) = match item {
        Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
        Value::Object(map) => (map.get("label")?, map.get("count")?),
        _ => return None,
    };
    Some(LabelCount {
        label: label.as_str()?.to_string(),
        count: count.as_u64()?,
    })
}

fn fallback_entities() -> Vec<EntityShare> {
    FALLBACK_ENTITIES
        .iter()
        .map(|(label, value)| EntityShare {
            label: (*label).to_string(),
            value: *value,
        })
        .collect()
}

fn fallback_top_labels() -> Vec<LabelCount> {
    FALLBACK_TOP_LABELS
        .iter()
        .map(|(label, count)| LabelCount {
            label: (*label).to_string(),
            count: *count,
        })
        .collect()
}

fn fallback_top_terms() -> Vec<String> {
    FALLBACK_TOP_TERMS.iter().map(|term| (*term).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use serde_json::json;

    fn dashboard() -> (tempfile::TempDir, Dashboard) {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ArtifactLayout::new(dir.path().join("data"), dir.path().join("artifacts"));
        (dir, Dashboard::new(layout))
    }

    fn write(path: &Path, value: &Value) {
        artifacts::write_json(path, value).expect("write artifact");
    }

    fn report(precision: f64, recall: f64, f1: f64) -> Value {
        json!({
            "macro avg": {"precision": precision, "recall": recall, "f1-score": f1, "support": 10}
        })
    }

    #[test]
    fn kpis_fall_back_without_artifacts() {
        let (_dir, dashboard) = dashboard();
        assert_eq!(dashboard.kpis(), Sourced::Fallback(Kpis::FALLBACK));
        assert_eq!(dashboard.radar_metrics().into_inner(), FALLBACK_RADAR.to_vec());
    }

    #[test]
    fn kpis_read_summary_and_report() {
        let (_dir, dashboard) = dashboard();
        write(&dashboard.layout().summary(), &json!({"macro_f1": 0.7, "accuracy": 0.75}));
        write(&dashboard.layout().report(), &report(0.6, 0.99, 0.65));

        let kpis = dashboard.kpis();
        assert!(!kpis.is_fallback());
        assert_eq!(
            *kpis.value(),
            Kpis {
                precision: 0.6,
                recall: 0.99,
                f1: 0.7,
                accuracy: 0.75
            }
        );

        let radar = dashboard.radar_metrics().into_inner();
        assert_eq!(radar[3].metric, "Coverage");
        assert!((radar[3].value - 1.0).abs() < 1e-12);
        assert!((radar[4].value - 0.25).abs() < 1e-12);
    }

    #[test]
    fn kpis_prefer_transformer_artifacts_and_fill_zero_f1() {
        let (_dir, dashboard) = dashboard();
        write(&dashboard.layout().summary(), &json!({"macro_f1": 0.1, "accuracy": 0.1}));
        write(&dashboard.layout().hf_summary(), &json!({"macro_f1": 0.0, "accuracy": 0.9}));
        write(&dashboard.layout().report(), &report(0.1, 0.1, 0.1));
        write(&dashboard.layout().hf_report(), &report(0.8, 0.85, 0.82));

        let kpis = dashboard.kpis().into_inner();
        assert_eq!(kpis.precision, 0.8);
        assert_eq!(kpis.f1, 0.82);
        assert_eq!(kpis.accuracy, 0.9);
    }

    #[test]
    fn kpis_fall_back_on_missing_fields_or_garbage() {
        let (_dir, dashboard) = dashboard();
        write(&dashboard.layout().summary(), &json!({"macro_f1": 0.7}));
        write(&dashboard.layout().report(), &report(0.6, 0.6, 0.6));
        assert!(dashboard.kpis().is_fallback());

        fs::write(dashboard.layout().summary(), "{oops").expect("write");
        assert!(dashboard.kpis().is_fallback());

        write(&dashboard.layout().summary(), &json!({}));
        assert!(dashboard.kpis().is_fallback());
    }

    #[test]
    fn entity_distribution_rounds_half_to_even() {
        let (_dir, dashboard) = dashboard();
        // 1/8 = 12.5% → 12, 5/8 = 62.5% → 62, 2/8 = 25%
        write(&dashboard.layout().label_stats(), &json!({"b": 5, "a": 1, "c": 2}));

        let shares = dashboard.entity_distribution();
        assert!(!shares.is_fallback());
        let shares = shares.into_inner();
        let pairs: Vec<_> = shares.iter().map(|s| (s.label.as_str(), s.value)).collect();
        assert_eq!(pairs, vec![("b", 62), ("c", 25), ("a", 12)]);
    }

    #[test]
    fn entity_distribution_keeps_top_six_with_label_tie_break() {
        let (_dir, dashboard) = dashboard();
        let stats: Map<String, Value> = ["g", "f", "e", "d", "c", "b", "a"]
            .iter()
            .map(|label| ((*label).to_string(), json!(1)))
            .collect();
        write(&dashboard.layout().label_stats(), &Value::Object(stats));

        let labels: Vec<String> = dashboard
            .entity_distribution()
            .into_inner()
            .into_iter()
            .map(|share| share.label)
            .collect();
        assert_eq!(labels, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn entity_distribution_falls_back_when_empty() {
        let (_dir, dashboard) = dashboard();
        write(&dashboard.layout().label_stats(), &json!({}));
        let shares = dashboard.entity_distribution();
        assert!(shares.is_fallback());
        assert_eq!(shares.value()[0].label, "NLP");
        assert_eq!(shares.value().len(), 5);
    }

    #[test]
    fn trend_series_is_constant() {
        let (_dir, dashboard) = dashboard();
        let months: Vec<_> = dashboard.trend_series().iter().map(|p| p.month).collect();
        assert_eq!(months, vec!["Jan", "Feb", "Mar", "Apr", "May", "Jun"]);
        assert_eq!(dashboard.trend_series()[5].value, 85);
    }

    #[test]
    fn insights_accept_pairs_and_objects_with_field_fallbacks() {
        let (_dir, dashboard) = dashboard();
        write(
            &dashboard.layout().insights(),
            &json!({
                "total_records": 42,
                "top_labels": [["cs.AI", 30], {"label": "cs.LG", "count": 12}, "junk"],
            }),
        );

        let insights = dashboard.insights();
        assert!(!insights.is_fallback());
        let insights = insights.into_inner();
        assert_eq!(insights.total_records, 42);
        assert_eq!(insights.unique_labels, FALLBACK_UNIQUE_LABELS);
        assert_eq!(
            insights.top_labels,
            vec![
                LabelCount {
                    label: "cs.AI".to_string(),
                    count: 30
                },
                LabelCount {
                    label: "cs.LG".to_string(),
                    count: 12
                }
            ]
        );
        assert_eq!(insights.top_terms_global, fallback_top_terms());
    }

    #[test]
    fn insights_fall_back_entirely_without_artifact() {
        let (_dir, dashboard) = dashboard();
        let insights = dashboard.insights();
        assert!(insights.is_fallback());
        assert_eq!(insights.value().total_records, FALLBACK_TOTAL_RECORDS);
        assert_eq!(insights.value().top_labels.len(), 3);
    }

    #[test]
    fn missing_artifacts_lists_unreadable_files() {
        let (_dir, dashboard) = dashboard();
        write(&dashboard.layout().hf_summary(), &json!({"macro_f1": 0.5, "accuracy": 0.5}));
        assert_eq!(
            dashboard.missing_artifacts(),
            vec!["report.json", "label_stats.json", "data_insights.json"]
        );
    }
}
