//! ChartSpec produced by the chart advisor (spec §3, §4.10).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Bar,
    GroupedBar,
    StackedBar,
    Area,
    Scatter,
    Pie,
    Histogram,
    BoxPlot,
    Heatmap,
    Table,
    Kpi,
    Gauge,
    Funnel,
    Sankey,
    Treemap,
    Waterfall,
    Sunburst,
    Radar,
    Parallel,
    ProcessFlow,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Min,
    Max,
    Average,
    TrendLine,
    AnomalyRegions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    Categorical,
    Sequential,
    Diverging,
    Semantic,
    None,
}

/// Chart recommendation attached to a [`crate::models::QueryResult`]
/// (spec §4.10); `ChartType::None` means no chart is recommendable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub x_field: Option<String>,
    pub y_fields: Vec<String>,
    pub series_field: Option<String>,
    pub annotations: HashSet<Annotation>,
    pub color_policy: ColorPolicy,
}

impl ChartSpec {
    pub fn none() -> Self {
        Self {
            chart_type: ChartType::None,
            x_field: None,
            y_fields: Vec::new(),
            series_field: None,
            annotations: HashSet::new(),
            color_policy: ColorPolicy::None,
        }
    }
}
