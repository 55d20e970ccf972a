use crate::error::Result;
use crate::metrics::MetricsSnapshot;
use serde_json::json;

pub const NO_PRIOR_DATA_MARKER: &str = "no prior period data";

const RESPONSE_SCHEMA: &str = r#"{
  "summary": "3-5 sentence plain-language narrative of the week",
  "hypotheses": [
    {
      "title": "short imperative title",
      "problem": "what the data shows is going wrong",
      "solution": "concrete change to try",
      "expected_impact": "which metric should move and roughly how much",
      "priority": "high|medium|low",
      "category": "ux|content|technical|marketing"
    }
  ],
  "quick_wins": [
    {"title": "...", "description": "...", "effort": "low|medium"}
  ],
  "page_insights": [
    {"path": "/some-page", "insight": "what stands out on this page"}
  ],
  "traffic_analysis": {"summary": "...", "top_sources": ["source / medium"]}
}"#;

/// Fixed system instruction. Everything variable lives in the user
/// message so the same business context produces the same system prompt.
pub fn system_context(business_context: &str) -> String {
    format!(
        "You are a web-analytics consultant writing the weekly performance review \
for this business: {business_context}\n\
\n\
You will receive aggregate analytics for the current week and, when available, \
the previous week. Compare them, explain what changed and why it matters, and \
propose improvements.\n\
\n\
Rules:\n\
- Return JSON only, no Markdown, matching exactly this schema:\n{RESPONSE_SCHEMA}\n\
- Provide 3 to 5 hypotheses, ordered most important first.\n\
- Provide 1 to 3 quick wins and at most 5 page insights.\n\
- priority, category and effort must use only the listed values.\n\
- Ground every claim in the numbers you were given; do not invent metrics."
    )
}

/// Serialized snapshots for the single user message. Field order comes
/// from the snapshot structs, so the same inputs produce the same prompt.
pub fn user_message(current: &MetricsSnapshot, previous: Option<&MetricsSnapshot>) -> Result<String> {
    let previous_value = match previous {
        Some(snapshot) => serde_json::to_value(snapshot)?,
        None => json!(NO_PRIOR_DATA_MARKER),
    };

    let payload = json!({
        "current_week": current,
        "previous_week": previous_value,
    });

    Ok(serde_json::to_string(&payload)?)
}
