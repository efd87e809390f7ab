//! Structured viability report.
//!
//! Analysis text is parsed in two stages: a fenced block is extracted if one
//! is present, then the payload is read as JSON. Anything unparseable is
//! replaced by [`basic_analysis`], which has the same schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vecsearch_index::SimilarRecord;

use crate::types::Venture;

const BASE_VIABILITY: f64 = 50.0;
const MAX_VIABILITY: f64 = 95.0;
const DEFAULT_MARKET_VALUE: f64 = 5_000_000.0;
const MAX_SIMILAR_PROJECTS: usize = 5;

const EARLY_STAGES: &[&str] = &["mvp", "lanzamiento", "launch"];
const GROWTH_STAGES: &[&str] = &["crecimiento", "escalado", "growth", "scaling"];

fn default_viability() -> f64 {
    BASE_VIABILITY
}

fn default_market_value() -> f64 {
    DEFAULT_MARKET_VALUE
}

/// Analysis payload. Accepts the Spanish keys of existing model prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Viability percentage, 0 to 100
    #[serde(default = "default_viability", alias = "viabilidad")]
    pub viability: f64,

    /// Estimated market value in USD
    #[serde(default = "default_market_value", alias = "valorMercado", alias = "marketValue")]
    pub market_value: f64,

    #[serde(default, alias = "fortalezas")]
    pub strengths: Vec<String>,

    #[serde(default, alias = "debilidades")]
    pub weaknesses: Vec<String>,

    #[serde(default, alias = "oportunidades")]
    pub opportunities: Vec<String>,

    #[serde(default, alias = "amenazas")]
    pub threats: Vec<String>,

    #[serde(default, alias = "recomendaciones")]
    pub recommendations: Vec<String>,

    #[serde(default, alias = "pivotesSugeridos", alias = "suggestedPivots")]
    pub suggested_pivots: Vec<String>,

    #[serde(default, alias = "analisisCompleto", alias = "fullAnalysis")]
    pub full_analysis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
}

/// Reference record as shown in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProject {
    pub name: String,
    pub sector: String,
    pub country: String,
    pub valuation: f64,
    /// Percentage, one decimal
    pub similarity: f64,
}

impl SimilarProject {
    fn from_similar(record: &SimilarRecord) -> Self {
        Self {
            name: record.name.clone(),
            sector: record.sector.clone(),
            country: record.country.clone(),
            valuation: record.valuation,
            similarity: (f64::from(record.similarity) * 1000.0).round() / 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub viability: f64,
    pub market_value: f64,
    pub similar_projects: Vec<SimilarProject>,
    pub recommendations: Vec<String>,
    pub suggested_pivots: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub full_analysis: String,
    pub analyzed_at: DateTime<Utc>,
    pub status: ReportStatus,
}

/// Payload inside the first ```` ```json ```` fence, else the first plain
/// fence, else the whole trimmed text
pub fn extract_payload(text: &str) -> &str {
    let text = text.trim();
    let fenced = text
        .split_once("```json")
        .or_else(|| text.split_once("```"))
        .map(|(_, rest)| rest.split_once("```").map_or(rest, |(body, _)| body));
    fenced.unwrap_or(text).trim()
}

/// Build a report from analysis text, falling back to the heuristic
pub fn structure_report(text: &str, venture: &Venture, similar: &[SimilarRecord]) -> Report {
    let analysis = match serde_json::from_str::<Analysis>(extract_payload(text)) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!("Analysis text is not valid JSON ({}), using heuristic analysis", e);
            basic_analysis(venture, similar)
        }
    };

    Report {
        viability: analysis.viability,
        market_value: analysis.market_value,
        similar_projects: similar
            .iter()
            .take(MAX_SIMILAR_PROJECTS)
            .map(SimilarProject::from_similar)
            .collect(),
        recommendations: analysis.recommendations,
        suggested_pivots: analysis.suggested_pivots,
        strengths: analysis.strengths,
        weaknesses: analysis.weaknesses,
        opportunities: analysis.opportunities,
        threats: analysis.threats,
        full_analysis: analysis.full_analysis,
        analyzed_at: Utc::now(),
        status: ReportStatus::Completed,
    }
}

/// Deterministic analysis from the stage, the description and the similar
/// records alone
pub fn basic_analysis(venture: &Venture, similar: &[SimilarRecord]) -> Analysis {
    let stage = venture.stage.trim().to_lowercase();
    let sector = if venture.sector.trim().is_empty() {
        "technology"
    } else {
        venture.sector.trim()
    };

    let mut viability = BASE_VIABILITY;
    if EARLY_STAGES.contains(&stage.as_str()) {
        viability += 15.0;
    } else if GROWTH_STAGES.contains(&stage.as_str()) {
        viability += 25.0;
    }
    if !similar.is_empty() {
        viability += 10.0;
    }
    if venture.description.chars().count() > 100 {
        viability += 5.0;
    }
    let viability = viability.min(MAX_VIABILITY);

    let market_value = if similar.is_empty() {
        DEFAULT_MARKET_VALUE
    } else {
        let mean = similar.iter().map(|r| r.valuation).sum::<f64>() / similar.len() as f64;
        (mean * 0.1).trunc()
    };

    debug!(
        "Heuristic analysis: viability {}, market value {}",
        viability, market_value
    );

    let name = if venture.name.is_empty() {
        "Unnamed project"
    } else {
        venture.name.as_str()
    };

    Analysis {
        viability,
        market_value,
        strengths: vec![
            format!("Project in the {} sector with growth potential", sector),
            format!("Stage {} is suitable for continued development", stage),
            "Innovative idea with a clear focus".to_string(),
        ],
        weaknesses: vec![
            "Needs deeper market validation".to_string(),
            "Requires a detailed financial plan".to_string(),
            "Missing information about direct competitors".to_string(),
        ],
        opportunities: vec![
            format!("{} market expanding globally", sector),
            "Room for international expansion".to_string(),
            "Favorable trends in the sector".to_string(),
        ],
        threats: vec![
            "High market competition".to_string(),
            "Potential regulatory changes".to_string(),
            "Significant investment required".to_string(),
        ],
        recommendations: vec![
            "Validate the problem with real users".to_string(),
            "Ship a working MVP as early as possible".to_string(),
            "Find mentors in the sector".to_string(),
            "Prepare a professional pitch deck".to_string(),
            "Identify early adopters".to_string(),
        ],
        suggested_pivots: vec![
            "Focus on a specific market niche".to_string(),
            format!("Explore a B2B model instead of B2C for {}", sector),
            "Consider strategic partnerships with established companies".to_string(),
        ],
        full_analysis: format!(
            "The project '{}' shows a viability of {}% at its current stage ({}). \
             The {} sector offers interesting opportunities given current market trends. \
             Focus on validating the problem and building the MVP to improve the odds of success. \
             The estimated market value in 3 to 5 years is ${} USD, based on sector comparables.",
            name,
            viability,
            stage,
            sector,
            group_thousands(market_value)
        ),
    }
}

/// `1234567.0` -> `"1,234,567"`
fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}
