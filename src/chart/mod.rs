//! ChartAdvisor (C10): an 8-rule ordered decision table over a materialized
//! `QueryResult` + the original question (spec §4.10). Pure and synchronous
//! except for an optional LLM tiebreak on ambiguous bar/line/area cases.

use std::collections::HashSet;

use crate::llm::{ChatMessage, CompletionOptions, LLMClient};
use crate::models::{Annotation, ChartSpec, ChartType, ColorPolicy, ColumnDescriptor, QueryResult, SemanticType};

struct ColumnStats<'a> {
    index: usize,
    descriptor: &'a ColumnDescriptor,
    distinct_count: usize,
}

const SAMPLE_ROWS: usize = 200;
const HIGH_CARDINALITY_THRESHOLD: usize = 10;
const HEATMAP_CARDINALITY_THRESHOLD: usize = 6;
/// Outlier threshold, in standard deviations from the mean, for the
/// anomaly-region annotation's statistical-skew fallback (spec §4.10 rule
/// 4). Grounded on `process/discovery.rs`'s own confidence-threshold style
/// of a single tunable constant rather than a magic number inline.
const ANOMALY_ZSCORE_THRESHOLD: f64 = 2.5;

/// Duplicated from `process::discovery::STATUS_NAME_HINTS` rather than
/// imported, so chart advice never couples to process-discovery internals.
const STATUS_NAME_HINTS: &[&str] = &["status", "state", "stage", "step", "phase"];

fn is_status_like_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    STATUS_NAME_HINTS.contains(&lower.as_str()) || STATUS_NAME_HINTS.iter().any(|hint| lower.ends_with(&format!("_{hint}")))
}

fn column_stats(result: &QueryResult) -> Vec<ColumnStats<'_>> {
    result
        .columns
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let mut seen = HashSet::new();
            for row in result.rows.iter().take(SAMPLE_ROWS) {
                if let Some(Some(value)) = row.get(index) {
                    seen.insert(value.as_str());
                }
            }
            ColumnStats { index, descriptor, distinct_count: seen.len() }
        })
        .collect()
}

fn is_numeric(stat: &ColumnStats) -> bool {
    matches!(stat.descriptor.data_type, SemanticType::Integer | SemanticType::Decimal)
}

fn is_temporal(stat: &ColumnStats) -> bool {
    matches!(stat.descriptor.data_type, SemanticType::Timestamp)
}

fn is_categorical(stat: &ColumnStats) -> bool {
    matches!(stat.descriptor.data_type, SemanticType::Text | SemanticType::Boolean)
}

fn mentions_any(question: &str, needles: &[&str]) -> bool {
    let question = question.to_lowercase();
    needles.iter().any(|n| question.contains(n))
}

fn sankey_triple<'a>(stats: &'a [ColumnStats<'a>]) -> Option<(&'a ColumnStats<'a>, &'a ColumnStats<'a>, &'a ColumnStats<'a>)> {
    let source = stats.iter().find(|s| matches!(s.descriptor.name.to_lowercase().as_str(), "source" | "from" | "origin"))?;
    let target = stats.iter().find(|s| matches!(s.descriptor.name.to_lowercase().as_str(), "target" | "to" | "destination"))?;
    let value = stats.iter().find(|s| is_numeric(s))?;
    Some((source, target, value))
}

/// A transition-shaped result: a `from`/`from_status`-style column, a
/// `to`/`to_status`-style column, and a literal `count` column — the shape
/// process discovery's transition builder emits (`process/builder.rs`).
/// Checked ahead of the generic two-categorical-plus-numeric rule since it
/// names its columns and can carry more than one numeric column (e.g. an
/// `avg_duration` alongside `count`), which the generic rule's exact
/// `numeric.len() == 1` requirement would otherwise reject.
fn transition_count_pair<'a>(stats: &'a [ColumnStats<'a>]) -> Option<(&'a ColumnStats<'a>, &'a ColumnStats<'a>, &'a ColumnStats<'a>)> {
    let from = stats.iter().find(|s| matches!(s.descriptor.name.to_lowercase().as_str(), "from" | "from_status"))?;
    let to = stats.iter().find(|s| matches!(s.descriptor.name.to_lowercase().as_str(), "to" | "to_status"))?;
    let count = stats.iter().find(|s| s.descriptor.name.eq_ignore_ascii_case("count") && is_numeric(s))?;
    Some((from, to, count))
}

/// True when any sampled value in `column_idx` sits more than
/// `ANOMALY_ZSCORE_THRESHOLD` standard deviations from the column's mean
/// (spec §4.10 rule 4's statistical fallback for anomaly regions, used when
/// the question itself doesn't name an anomaly).
fn has_statistical_outlier(result: &QueryResult, column_idx: usize) -> bool {
    let values: Vec<f64> = result.rows.iter().take(SAMPLE_ROWS).filter_map(|row| row.get(column_idx)?.as_deref()?.parse::<f64>().ok()).collect();
    if values.len() < 3 {
        return false;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return false;
    }
    values.iter().any(|v| ((v - mean) / stddev).abs() > ANOMALY_ZSCORE_THRESHOLD)
}

fn hierarchical_fields(stats: &[ColumnStats]) -> Option<(String, String)> {
    for parent in stats {
        let lower = parent.descriptor.name.to_lowercase();
        let Some(root) = lower.strip_suffix("_parent") else { continue };
        let child_name = format!("{root}_child");
        if stats.iter().any(|s| s.descriptor.name.to_lowercase() == child_name) {
            return Some((parent.descriptor.name.clone(), child_name));
        }
    }
    None
}

/// The heuristic's first guess for the temporal+numeric case (rule 4),
/// used directly when no LLM tiebreak is available.
fn heuristic_line_or_area(has_series: bool) -> ChartType {
    if has_series { ChartType::Area } else { ChartType::Line }
}

async fn llm_tiebreak(llm: &dyn LLMClient, question: &str) -> Option<ChartType> {
    let prompt = format!(
        "A user asked: \"{question}\". A result table has one time column and at least one numeric \
         column. Reply with exactly one word: bar, line, or area."
    );
    let messages = vec![
        ChatMessage::system("You classify chart types. Reply with exactly one lowercase word.".to_string()),
        ChatMessage::user(prompt),
    ];
    let options = CompletionOptions { temperature: 0.0, ..Default::default() };
    let response = llm.complete(&messages, &options).await.ok()?;
    match response.trim().to_lowercase().as_str() {
        "bar" => Some(ChartType::Bar),
        "line" => Some(ChartType::Line),
        "area" => Some(ChartType::Area),
        _ => None,
    }
}

/// Recommends a chart for `result` given the original natural-language
/// `question`, with an optional LLM collaborator for the ambiguous
/// bar/line/area tiebreak (spec §4.10).
pub async fn recommend(result: &QueryResult, question: &str, llm: Option<&dyn LLMClient>) -> ChartSpec {
    if result.rows.is_empty() {
        return ChartSpec { chart_type: ChartType::Table, ..ChartSpec::none() };
    }

    let stats = column_stats(result);
    let numeric: Vec<&ColumnStats> = stats.iter().filter(|s| is_numeric(s)).collect();
    let temporal: Vec<&ColumnStats> = stats.iter().filter(|s| is_temporal(s)).collect();
    let categorical: Vec<&ColumnStats> = stats.iter().filter(|s| is_categorical(s)).collect();

    if result.rows.len() == 1 && numeric.len() <= 4 {
        return ChartSpec {
            chart_type: ChartType::Kpi,
            x_field: None,
            y_fields: numeric.iter().map(|s| s.descriptor.name.clone()).collect(),
            series_field: None,
            annotations: HashSet::new(),
            color_policy: ColorPolicy::None,
        };
    }

    if let Some((source, target, value)) = sankey_triple(&stats) {
        return ChartSpec {
            chart_type: ChartType::Sankey,
            x_field: Some(source.descriptor.name.clone()),
            y_fields: vec![value.descriptor.name.clone()],
            series_field: Some(target.descriptor.name.clone()),
            annotations: HashSet::new(),
            color_policy: ColorPolicy::Categorical,
        };
    }

    if let Some((from, to, count)) = transition_count_pair(&stats) {
        return ChartSpec {
            chart_type: ChartType::Bar,
            x_field: Some(from.descriptor.name.clone()),
            y_fields: vec![count.descriptor.name.clone()],
            series_field: Some(to.descriptor.name.clone()),
            annotations: HashSet::new(),
            color_policy: ColorPolicy::Semantic,
        };
    }

    if temporal.len() == 1 && !numeric.is_empty() {
        let has_series = !categorical.is_empty();
        let mut chart_type = heuristic_line_or_area(has_series);
        if let Some(llm) = llm {
            if let Some(tiebreak) = llm_tiebreak(llm, question).await {
                chart_type = tiebreak;
            }
        }
        // Trend line and min/max always annotate a temporal+numeric chart
        // (spec §4.10 rule 4); anomaly regions are added on top only when
        // the question names one or the sampled values show a real outlier.
        let mut annotations = HashSet::from([Annotation::TrendLine, Annotation::Min, Annotation::Max]);
        let mentions_anomaly = mentions_any(question, &["anomaly", "anomalies", "outlier", "outliers", "spike"]);
        let has_outlier = numeric.iter().any(|s| has_statistical_outlier(result, s.index));
        if mentions_anomaly || has_outlier {
            annotations.insert(Annotation::AnomalyRegions);
        }
        return ChartSpec {
            chart_type,
            x_field: Some(temporal[0].descriptor.name.clone()),
            y_fields: numeric.iter().map(|s| s.descriptor.name.clone()).collect(),
            series_field: categorical.first().map(|s| s.descriptor.name.clone()),
            annotations,
            color_policy: if has_series { ColorPolicy::Categorical } else { ColorPolicy::Sequential },
        };
    }

    if categorical.len() == 1 && numeric.len() == 1 {
        let category = categorical[0];
        let wants_pie = mentions_any(question, &["share", "proportion", "percentage", "distribution"]);
        let chart_type = if wants_pie { ChartType::Pie } else { ChartType::Bar };
        let color_policy = if wants_pie {
            ColorPolicy::Categorical
        } else if is_status_like_name(&category.descriptor.name) {
            ColorPolicy::Semantic
        } else {
            ColorPolicy::Categorical
        };
        return ChartSpec {
            chart_type,
            x_field: Some(category.descriptor.name.clone()),
            y_fields: numeric.iter().map(|s| s.descriptor.name.clone()).collect(),
            series_field: None,
            annotations: HashSet::new(),
            color_policy,
        };
    }

    if categorical.len() == 2 && numeric.len() == 1 {
        let both_high_cardinality = categorical.iter().all(|c| c.distinct_count > HEATMAP_CARDINALITY_THRESHOLD);
        let chart_type = if both_high_cardinality {
            ChartType::Heatmap
        } else if mentions_any(question, &["share", "total", "breakdown"]) {
            ChartType::StackedBar
        } else {
            ChartType::GroupedBar
        };
        return ChartSpec {
            chart_type,
            x_field: Some(categorical[0].descriptor.name.clone()),
            y_fields: numeric.iter().map(|s| s.descriptor.name.clone()).collect(),
            series_field: Some(categorical[1].descriptor.name.clone()),
            annotations: HashSet::new(),
            color_policy: ColorPolicy::Categorical,
        };
    }

    if let Some((parent_field, child_field)) = hierarchical_fields(&stats) {
        let chart_type = if mentions_any(question, &["sunburst"]) { ChartType::Sunburst } else { ChartType::Treemap };
        return ChartSpec {
            chart_type,
            x_field: Some(parent_field),
            y_fields: numeric.iter().map(|s| s.descriptor.name.clone()).collect(),
            series_field: Some(child_field),
            annotations: HashSet::new(),
            color_policy: ColorPolicy::Sequential,
        };
    }

    ChartSpec { chart_type: ChartType::Table, ..ChartSpec::none() }
}
