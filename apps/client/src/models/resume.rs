use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strength {
    pub title: String,
    #[serde(rename = "desc")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedProject {
    pub id: String,
    pub title: String,
    pub brief: String,
}

/// One axis of the skills radar. Scores are 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScore {
    pub dimension: String,
    pub current: u8,
    pub target: u8,
}

/// What an analyzer produces for one résumé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub strengths: Vec<Strength>,
    pub gaps: Vec<String>,
    pub recommended_projects: Vec<RecommendedProject>,
    pub skills_radar: Vec<SkillScore>,
}

/// Row of the `resume_analysis` table. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_url: String,
    #[serde(flatten)]
    pub payload: AnalysisPayload,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResumeAnalysis {
    pub user_id: Uuid,
    pub resume_url: String,
    #[serde(flatten)]
    pub payload: AnalysisPayload,
}
