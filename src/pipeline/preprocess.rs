use std::collections::{BTreeMap, HashMap};
use std::fs;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::error::PipelineError;
use crate::observability::Metrics;
use crate::schema::atom::{AtomEntry, UNKNOWN_LABEL, parse_feed};
use crate::schema::paper::PaperRecord;
use crate::store::{ArtifactLayout, artifacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessParams {
    /// この件数未満のラベルを持つレコードは捨てる。
    pub min_label_count: usize,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self { min_label_count: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOutcome {
    pub saved: usize,
    pub dropped: usize,
    pub label_stats: BTreeMap<String, usize>,
}

/// 生フィードから学習用レコードを作る。
///
/// タイトル・要約が空、またはラベルが無いエントリはそもそも記録しない。
/// 記録したもののうち、出現数が `min_label_count` 未満のラベルは落とす。
///
/// # Errors
/// 生ページが1つも無い場合は [`PipelineError::MissingInput`]、
/// XML が壊れている場合は [`PipelineError::MalformedFeed`] を返す。
#[instrument(skip_all, fields(min_label_count = params.min_label_count))]
pub fn run(
    layout: &ArtifactLayout,
    params: &PreprocessParams,
    metrics: &Metrics,
) -> Result<PreprocessOutcome> {
    let _timer = metrics
        .stage_duration
        .with_label_values(&["preprocess"])
        .start_timer();

    let pages = layout.raw_pages()?;
    if pages.is_empty() {
        return Err(PipelineError::missing(layout.raw_dir(), "Run ingest first.").into());
    }

    let mut records = Vec::new();
    for page in &pages {
        let xml = fs::read_to_string(page)
            .with_context(|| format!("failed to read {}", page.display()))?;
        let entries = parse_feed(&xml).map_err(|error| PipelineError::MalformedFeed {
            path: page.clone(),
            reason: error.to_string(),
        })?;
        debug!(page = %page.display(), entries = entries.len(), "parsed feed page");
        records.extend(entries.iter().filter_map(to_record));
    }

    let recorded = records.len();
    let (kept, label_stats) = filter_rare_labels(records, params.min_label_count);
    let saved = artifacts::write_jsonl(&layout.papers(), &kept)?;
    artifacts::write_json(&layout.label_stats(), &label_stats)?;

    let dropped = recorded - saved;
    metrics.records_kept.inc_by(saved as f64);
    metrics.records_dropped.inc_by(dropped as f64);
    info!(saved, dropped, labels = label_stats.len(), "preprocess finished");

    Ok(PreprocessOutcome {
        saved,
        dropped,
        label_stats,
    })
}

/// 学習に使えるエントリだけをレコードに変換する。
fn to_record(entry: &AtomEntry) -> Option<PaperRecord> {
    let label = entry.label();
    if entry.title.is_empty() || entry.summary.is_empty() || label == UNKNOWN_LABEL {
        return None;
    }
    Some(PaperRecord::new(&entry.title, &entry.summary, label))
}

/// 出現数が閾値以上のラベルのレコードだけを入力順で残し、残したラベルの件数を返す。
pub(crate) fn filter_rare_labels(
    records: Vec<PaperRecord>,
    min_label_count: usize,
) -> (Vec<PaperRecord>, BTreeMap<String, usize>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in &records {
        *counts.entry(record.label.as_str()).or_default() += 1;
    }
    let kept_labels: BTreeMap<String, usize> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_label_count)
        .map(|(label, count)| (label.to_string(), count))
        .collect();

    let kept = records
        .into_iter()
        .filter(|record| kept_labels.contains_key(&record.label))
        .collect();
    (kept, kept_labels)
}
