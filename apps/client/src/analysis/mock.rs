use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::analysis::{JobMatcher, ResumeAnalyzer};
use crate::errors::ServiceError;
use crate::models::{
    AnalysisPayload, NewJobRecommendation, RecommendedProject, SkillScore, Strength,
};

/// Number of rows `MockJobMatcher` produces per run.
pub const MOCK_RECOMMENDATION_COUNT: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

/// Returns the same analysis for every résumé.
#[derive(Debug, Clone, Default)]
pub struct MockResumeAnalyzer {
    delay: Duration,
}

impl MockResumeAnalyzer {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ResumeAnalyzer for MockResumeAnalyzer {
    async fn analyze(&self, _resume_url: &str) -> Result<AnalysisPayload, ServiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(mock_analysis())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

fn strength(title: &str, description: &str) -> Strength {
    Strength {
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn radar(dimension: &str, current: u8, target: u8) -> SkillScore {
    SkillScore {
        dimension: dimension.to_string(),
        current,
        target,
    }
}

pub fn mock_analysis() -> AnalysisPayload {
    AnalysisPayload {
        strengths: vec![
            strength(
                "Systems thinking",
                "Breaks complex problems down into a structured analysis",
            ),
            strength(
                "User insight",
                "Turns interviews and data into actionable conclusions",
            ),
            strength(
                "Growth awareness",
                "Understands funnels and growth models, tracks the key metrics",
            ),
        ],
        gaps: vec![
            "SQL and data visualization".to_string(),
            "Algorithm fundamentals and evaluation metrics".to_string(),
            "Experiment design (sample size, significance)".to_string(),
        ],
        recommended_projects: vec![
            RecommendedProject {
                id: "resume-ai".to_string(),
                title: "Design an AI-powered résumé optimization tool".to_string(),
                brief: "Design an end-to-end product and prototype that scores résumé quality and suggests improvements.".to_string(),
            },
            RecommendedProject {
                id: "abt-platform".to_string(),
                title: "Build an A/B experiment configuration platform".to_string(),
                brief: "Give product teams one place to configure experiments, track metrics and read results.".to_string(),
            },
        ],
        skills_radar: vec![
            radar("Data literacy", 45, 85),
            radar("User insight", 60, 90),
            radar("Cross-functional collaboration", 55, 88),
            radar("Requirements analysis", 62, 92),
            radar("Product strategy", 40, 86),
            radar("A/B testing", 35, 80),
        ],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matcher
// ────────────────────────────────────────────────────────────────────────────

/// Returns the same three openings for every user.
#[derive(Debug, Clone, Default)]
pub struct MockJobMatcher {
    delay: Duration,
}

impl MockJobMatcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl JobMatcher for MockJobMatcher {
    async fn recommend(&self, user_id: Uuid) -> Result<Vec<NewJobRecommendation>, ServiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(mock_recommendations(user_id))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[allow(clippy::too_many_arguments)]
fn job(
    user_id: Uuid,
    company: &str,
    position: &str,
    location: &str,
    salary: &str,
    match_score: i32,
    match_reason: &str,
    tags: &[&str],
) -> NewJobRecommendation {
    NewJobRecommendation {
        user_id,
        company: company.to_string(),
        position: position.to_string(),
        location: Some(location.to_string()),
        salary: Some(salary.to_string()),
        match_score,
        match_reason: Some(match_reason.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn mock_recommendations(user_id: Uuid) -> Vec<NewJobRecommendation> {
    vec![
        job(
            user_id,
            "ByteDance",
            "AI User Behavior Analytics Product Manager",
            "Beijing",
            "25-40K",
            92,
            "The role values reasoning about complex systems, a close match for your engineering background.",
            &["AI product", "User analytics", "B2B product"],
        ),
        job(
            user_id,
            "Tencent",
            "Recommendation Algorithms Product Manager",
            "Shenzhen",
            "30-45K",
            89,
            "Your data analysis skills fit what a recommendation product needs.",
            &["Recommendation", "Data product", "Consumer product"],
        ),
        job(
            user_id,
            "Alibaba",
            "AI Monetization Product Manager",
            "Hangzhou",
            "28-42K",
            86,
            "Your growth awareness lines up with a monetization product's goals.",
            &["AI product", "Monetization", "B2B product"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radar_scores_within_bounds() {
        for axis in mock_analysis().skills_radar {
            assert!(axis.current <= 100 && axis.target <= 100);
            assert!(axis.current < axis.target, "{} has no gap", axis.dimension);
        }
    }

    #[test]
    fn test_recommended_projects_have_unique_ids() {
        let projects = mock_analysis().recommended_projects;
        let ids: std::collections::HashSet<_> = projects.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), projects.len());
    }

    #[tokio::test]
    async fn test_matcher_produces_fixed_set_for_user() {
        let user = Uuid::new_v4();
        let rows = MockJobMatcher::default().recommend(user).await.unwrap();
        assert_eq!(rows.len(), MOCK_RECOMMENDATION_COUNT);
        assert!(rows.iter().all(|r| r.user_id == user));
        assert!(rows.iter().all(|r| (0..=100).contains(&r.match_score)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyzer_delay_is_honored() {
        let analyzer = MockResumeAnalyzer::with_delay(Duration::from_millis(2000));
        let started = tokio::time::Instant::now();
        analyzer.analyze("memory://resumes/u1/1.pdf").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }
}
