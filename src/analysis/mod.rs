pub mod client;
pub mod prompt;

use crate::error::{DigestError, Result};
use crate::metrics::MetricsSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const MIN_HYPOTHESES: usize = 3;
const MAX_HYPOTHESES: usize = 5;
const MIN_QUICK_WINS: usize = 1;
const MAX_QUICK_WINS: usize = 3;
const MAX_PAGE_INSIGHTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ux,
    Content,
    Technical,
    Marketing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ux => "ux",
            Self::Content => "content",
            Self::Technical => "technical",
            Self::Marketing => "marketing",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ux" => Some(Self::Ux),
            "content" => Some(Self::Content),
            "technical" => Some(Self::Technical),
            "marketing" => Some(Self::Marketing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
}

/// One improvement proposal as produced by the model, before it gets a
/// lifecycle row in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisDraft {
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub expected_impact: String,
    pub priority: Priority,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickWin {
    pub title: String,
    pub description: String,
    pub effort: Effort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInsight {
    pub path: String,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficAnalysis {
    pub summary: String,
    pub top_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub hypotheses: Vec<HypothesisDraft>,
    pub quick_wins: Vec<QuickWin>,
    pub page_insights: Vec<PageInsight>,
    pub traffic_analysis: TrafficAnalysis,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Runs the single model invocation for a report attempt and returns the
/// validated analysis. The reply is non-deterministic, so the caller must
/// not re-run this for an already-terminal report.
pub async fn analyze(
    model: &dyn ModelClient,
    current: &MetricsSnapshot,
    previous: Option<&MetricsSnapshot>,
    business_context: &str,
) -> Result<AnalysisResult> {
    let system = prompt::system_context(business_context);
    let user = prompt::user_message(current, previous)?;

    let content = model.complete(&system, &user).await?;

    parse_analysis_payload(&content)
}

pub fn parse_analysis_payload(content: &str) -> Result<AnalysisResult> {
    let extracted = extract_json_block(content);

    let result: AnalysisResult = serde_json::from_str(&extracted)
        .map_err(|error| DigestError::ModelOutputInvalid(error.to_string()))?;

    validate(&result)?;

    Ok(result)
}

fn validate(result: &AnalysisResult) -> Result<()> {
    if result.summary.trim().is_empty() {
        return invalid("summary is empty");
    }

    let hypothesis_count = result.hypotheses.len();
    if !(MIN_HYPOTHESES..=MAX_HYPOTHESES).contains(&hypothesis_count) {
        return invalid(&format!(
            "expected {MIN_HYPOTHESES}-{MAX_HYPOTHESES} hypotheses, got {hypothesis_count}"
        ));
    }

    for (index, hypothesis) in result.hypotheses.iter().enumerate() {
        let fields = [
            ("title", &hypothesis.title),
            ("problem", &hypothesis.problem),
            ("solution", &hypothesis.solution),
            ("expected_impact", &hypothesis.expected_impact),
        ];

        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return invalid(&format!("hypothesis {index} has an empty {name}"));
        }
    }

    let quick_win_count = result.quick_wins.len();
    if !(MIN_QUICK_WINS..=MAX_QUICK_WINS).contains(&quick_win_count) {
        return invalid(&format!(
            "expected {MIN_QUICK_WINS}-{MAX_QUICK_WINS} quick wins, got {quick_win_count}"
        ));
    }

    if result.page_insights.len() > MAX_PAGE_INSIGHTS {
        return invalid(&format!(
            "expected at most {MAX_PAGE_INSIGHTS} page insights, got {}",
            result.page_insights.len()
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> Result<()> {
    Err(DigestError::ModelOutputInvalid(message.to_string()))
}

/// Models regularly wrap the JSON document in Markdown fences despite
/// instructions; accept fenced, bare-braced and prose-wrapped replies.
fn extract_json_block(content: &str) -> String {
    let fenced = content.split("```").map(str::trim).find_map(|block| {
        block
            .strip_prefix("json")
            .map(str::trim)
            .or_else(|| block.starts_with('{').then_some(block))
    });

    match fenced {
        Some(block) => block.to_string(),
        None => {
            let first = content.find('{');
            let last = content.rfind('}');

            match (first, last) {
                (Some(start), Some(end)) if end > start => content[start..=end].to_string(),
                _ => content.trim().to_string(),
            }
        }
    }
}
