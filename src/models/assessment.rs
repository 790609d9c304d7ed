use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scorer output: the ForgeScore plus everything needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: i32,                      // -100..=100
    pub base_score: f64,                 // Sum of categories before multipliers
    pub category_breakdown: CategoryBreakdown,
    pub risk_flags: Vec<RiskFlag>,
    pub narrative_sections: Vec<NarrativeSection>,
    pub as_of: NaiveDate,
}

impl RiskAssessment {
    pub fn has_flag(&self, kind: RiskFlagKind) -> bool {
        self.risk_flags.iter().any(|f| f.kind == kind)
    }

    pub fn rating(&self) -> &'static str {
        match self.score {
            i32::MIN..=-50 => "Extreme risk",
            -49..=-1 => "High risk",
            0..=24 => "Neutral",
            25..=74 => "Good potential",
            _ => "High trust",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub technical: CategoryScore,
    pub market_health: CategoryScore,
    pub holder_metrics: CategoryScore,
    pub social: CategoryScore,
}

impl CategoryBreakdown {
    pub fn total(&self) -> f64 {
        self.technical.points + self.market_health.points + self.holder_metrics.points + self.social.points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub points: f64,
    pub max_points: f64,
    pub sub_points: Vec<SubPoint>,
}

impl CategoryScore {
    pub fn new(max_points: f64, sub_points: Vec<SubPoint>) -> Self {
        let points = sub_points.iter().map(|s| s.points).sum();
        Self { points, max_points, sub_points }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPoint {
    pub label: String,
    pub points: f64,
    pub max_points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlagKind {
    HolderConcentration,
    LowLiquidity,
    VolumeDivergence,
    SuspiciousBondingCurve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub kind: RiskFlagKind,
    pub multiplier: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub title: String,
    pub body: String,
}

/// Recent news handed to the scorer as market context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    pub content: String,
    pub link: String,
    pub updated_at: String,
}
