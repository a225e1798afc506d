//! Direct PostgreSQL implementation of `RowStore`, for trusted deployments that hold
//! a database URL instead of going through PostgREST.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::backend::store::RowStore;
use crate::errors::BackendError;
use crate::models::{
    AnalysisPayload, Deliverable, JobRecommendation, NewJobRecommendation, NewProfile,
    NewProjectProgress, NewResumeAnalysis, Profile, ProfileUpdate, ProgressUpdate,
    ProjectProgress, RecommendedProject, ResumeAnalysis, SkillScore, Strength,
};

#[derive(FromRow)]
struct AnalysisRow {
    id: Uuid,
    user_id: Uuid,
    resume_url: String,
    strengths: Json<Vec<Strength>>,
    gaps: Vec<String>,
    recommended_projects: Json<Vec<RecommendedProject>>,
    skills_radar: Json<Vec<SkillScore>>,
    created_at: DateTime<Utc>,
}

impl From<AnalysisRow> for ResumeAnalysis {
    fn from(row: AnalysisRow) -> Self {
        ResumeAnalysis {
            id: row.id,
            user_id: row.user_id,
            resume_url: row.resume_url,
            payload: AnalysisPayload {
                strengths: row.strengths.0,
                gaps: row.gaps,
                recommended_projects: row.recommended_projects.0,
                skills_radar: row.skills_radar.0,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRow {
    id: Uuid,
    user_id: Uuid,
    project_id: String,
    status: String,
    progress: i32,
    deliverables: Json<Vec<Deliverable>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for ProjectProgress {
    type Error = BackendError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(ProjectProgress {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            status: row.status.parse().map_err(BackendError::Unexpected)?,
            progress: row.progress,
            deliverables: row.deliverables.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, BackendError> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

const INSERT_JOB: &str = r#"
    INSERT INTO job_recommendations
        (user_id, company, position, location, salary, match_score, match_reason, tags)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING *
"#;

#[async_trait]
impl RowStore for PgStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Profile>, BackendError> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        Ok(sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, name, education, career_goal, resume_url, linkedin_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.education)
        .bind(&profile.career_goal)
        .bind(&profile.resume_url)
        .bind(&profile.linkedin_url)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), BackendError> {
        // COALESCE keeps every column the caller did not supply.
        sqlx::query(
            r#"
            UPDATE profiles SET
                name         = COALESCE($2, name),
                education    = COALESCE($3, education),
                career_goal  = COALESCE($4, career_goal),
                resume_url   = COALESCE($5, resume_url),
                linkedin_url = COALESCE($6, linkedin_url),
                updated_at   = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.education)
        .bind(&update.career_goal)
        .bind(&update.resume_url)
        .bind(&update.linkedin_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_analysis(
        &self,
        analysis: &NewResumeAnalysis,
    ) -> Result<ResumeAnalysis, BackendError> {
        let row = sqlx::query_as::<_, AnalysisRow>(
            r#"
            INSERT INTO resume_analysis
                (user_id, resume_url, strengths, gaps, recommended_projects, skills_radar)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(analysis.user_id)
        .bind(&analysis.resume_url)
        .bind(Json(&analysis.payload.strengths))
        .bind(&analysis.payload.gaps)
        .bind(Json(&analysis.payload.recommended_projects))
        .bind(Json(&analysis.payload.skills_radar))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn latest_analysis(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ResumeAnalysis>, BackendError> {
        let row = sqlx::query_as::<_, AnalysisRow>(
            "SELECT * FROM resume_analysis WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        project_id: &str,
    ) -> Result<Option<ProjectProgress>, BackendError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT * FROM project_progress WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert_progress(
        &self,
        progress: &NewProjectProgress,
    ) -> Result<ProjectProgress, BackendError> {
        sqlx::query_as::<_, ProgressRow>(
            r#"
            INSERT INTO project_progress (user_id, project_id, status, progress, deliverables)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(progress.user_id)
        .bind(&progress.project_id)
        .bind(progress.status.as_str())
        .bind(progress.progress)
        .bind(Json(&progress.deliverables))
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<(), BackendError> {
        sqlx::query(
            r#"
            UPDATE project_progress SET
                status       = COALESCE($2, status),
                progress     = COALESCE($3, progress),
                deliverables = COALESCE($4, deliverables),
                updated_at   = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.progress)
        .bind(update.deliverables.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        Ok(sqlx::query_as::<_, JobRecommendation>(
            "SELECT * FROM job_recommendations WHERE user_id = $1 ORDER BY match_score DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_job_recommendations(&self, user_id: Uuid) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM job_recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_job_recommendations(
        &self,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(bind_job(row).fetch_one(&self.pool).await?);
        }
        Ok(inserted)
    }

    /// Delete and insert inside one transaction: readers never see an empty set.
    async fn replace_job_recommendations(
        &self,
        user_id: Uuid,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM job_recommendations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(bind_job(row).fetch_one(&mut *tx).await?);
        }

        tx.commit().await?;
        info!(
            "Replaced job recommendations for user {user_id} ({} rows)",
            inserted.len()
        );
        Ok(inserted)
    }
}

fn bind_job(
    row: &NewJobRecommendation,
) -> sqlx::query::QueryAs<'_, sqlx::Postgres, JobRecommendation, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, JobRecommendation>(INSERT_JOB)
        .bind(row.user_id)
        .bind(&row.company)
        .bind(&row.position)
        .bind(&row.location)
        .bind(&row.salary)
        .bind(row.match_score)
        .bind(&row.match_reason)
        .bind(&row.tags)
}
