//! PostgREST (`/rest/v1`) implementation of `RowStore`.
//!
//! Requests run as the signed-in user (bearer = current access token) so row-level
//! security on the backend scopes every table to its owner.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::backend::auth::Session;
use crate::backend::http::RestClient;
use crate::backend::store::RowStore;
use crate::errors::BackendError;
use crate::models::{
    JobRecommendation, NewJobRecommendation, NewProfile, NewProjectProgress, NewResumeAnalysis,
    Profile, ProfileUpdate, ProgressUpdate, ProjectProgress, ResumeAnalysis,
};

const PROFILES: &str = "profiles";
const RESUME_ANALYSIS: &str = "resume_analysis";
const PROJECT_PROGRESS: &str = "project_progress";
const JOB_RECOMMENDATIONS: &str = "job_recommendations";

/// A table query: equality filters, one ordering, an optional limit.
#[derive(Debug, Clone)]
pub struct Query {
    table: &'static str,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.desc"));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

pub struct PostgrestStore {
    rest: RestClient,
    session: watch::Receiver<Option<Session>>,
}

impl PostgrestStore {
    pub fn new(rest: RestClient, session: watch::Receiver<Option<Session>>) -> Self {
        Self { rest, session }
    }

    fn bearer(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn select<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>, BackendError> {
        let bearer = self.bearer();
        let mut params = query.params();
        params.push(("select".to_string(), "*".to_string()));
        let request = self
            .rest
            .request(Method::GET, &query.path(), bearer.as_deref())
            .query(&params);
        let response = self.rest.send(request, true).await?;
        Ok(response.json().await?)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
    ) -> Result<Vec<T>, BackendError> {
        let bearer = self.bearer();
        let request = self
            .rest
            .request(Method::POST, &Query::table(table).path(), bearer.as_deref())
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.rest.send(request, false).await?;
        Ok(response.json().await?)
    }

    async fn update<B: Serialize>(&self, query: Query, body: &B) -> Result<(), BackendError> {
        let bearer = self.bearer();
        let request = self
            .rest
            .request(Method::PATCH, &query.path(), bearer.as_deref())
            .query(&query.params())
            .header("Prefer", "return=minimal")
            .json(body);
        self.rest.send(request, true).await?;
        Ok(())
    }

    async fn delete(&self, query: Query) -> Result<(), BackendError> {
        let bearer = self.bearer();
        let request = self
            .rest
            .request(Method::DELETE, &query.path(), bearer.as_deref())
            .query(&query.params());
        self.rest.send(request, true).await?;
        Ok(())
    }

    async fn insert_one<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
    ) -> Result<T, BackendError> {
        let mut rows: Vec<T> = self.insert(table, body).await?;
        if rows.is_empty() {
            return Err(BackendError::Unexpected(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Profile>, BackendError> {
        let rows: Vec<Profile> = self.select(Query::table(PROFILES).eq("id", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        self.insert_one(PROFILES, profile).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), BackendError> {
        self.update(Query::table(PROFILES).eq("id", id), update)
            .await
    }

    async fn insert_analysis(
        &self,
        analysis: &NewResumeAnalysis,
    ) -> Result<ResumeAnalysis, BackendError> {
        self.insert_one(RESUME_ANALYSIS, analysis).await
    }

    async fn latest_analysis(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ResumeAnalysis>, BackendError> {
        let rows: Vec<ResumeAnalysis> = self
            .select(
                Query::table(RESUME_ANALYSIS)
                    .eq("user_id", user_id)
                    .order_desc("created_at")
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        project_id: &str,
    ) -> Result<Option<ProjectProgress>, BackendError> {
        let rows: Vec<ProjectProgress> = self
            .select(
                Query::table(PROJECT_PROGRESS)
                    .eq("user_id", user_id)
                    .eq("project_id", project_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_progress(
        &self,
        progress: &NewProjectProgress,
    ) -> Result<ProjectProgress, BackendError> {
        self.insert_one(PROJECT_PROGRESS, progress).await
    }

    async fn update_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<(), BackendError> {
        self.update(Query::table(PROJECT_PROGRESS).eq("id", id), update)
            .await
    }

    async fn list_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        self.select(
            Query::table(JOB_RECOMMENDATIONS)
                .eq("user_id", user_id)
                .order_desc("match_score"),
        )
        .await
    }

    async fn delete_job_recommendations(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.delete(Query::table(JOB_RECOMMENDATIONS).eq("user_id", user_id))
            .await
    }

    async fn insert_job_recommendations(
        &self,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let inserted: Vec<JobRecommendation> = self.insert(JOB_RECOMMENDATIONS, rows).await?;
        debug!("Inserted {} job recommendations", inserted.len());
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::http::stub;
    use crate::models::DEFAULT_PROFILE_NAME;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn store(rest: RestClient) -> PostgrestStore {
        let (_tx, rx) = watch::channel(None);
        PostgrestStore::new(rest, rx)
    }

    #[tokio::test]
    async fn test_insert_asks_for_the_written_row() {
        let rest = stub::serve(Router::new().route(
            "/rest/v1/profiles",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let prefer = headers.get("prefer").and_then(|v| v.to_str().ok());
                if prefer != Some("return=representation") {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "message": "no prefer" })));
                }
                let mut row = body;
                row["created_at"] = json!("2024-03-01T10:00:00Z");
                row["updated_at"] = json!("2024-03-01T10:00:00Z");
                (StatusCode::CREATED, Json(json!([row])))
            }),
        ))
        .await;

        let id = Uuid::new_v4();
        let profile = store(rest)
            .insert_profile(&NewProfile::default_for(id))
            .await
            .unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.name, DEFAULT_PROFILE_NAME);
    }

    #[tokio::test]
    async fn test_insert_returning_nothing_is_an_error() {
        let rest = stub::serve(Router::new().route(
            "/rest/v1/profiles",
            post(|| async { (StatusCode::CREATED, Json(json!([]))) }),
        ))
        .await;

        let err = store(rest)
            .insert_profile(&NewProfile::default_for(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unexpected(_)));
    }

    #[test]
    fn test_query_params_encode_filters_order_and_limit() {
        let user = Uuid::nil();
        let query = Query::table(RESUME_ANALYSIS)
            .eq("user_id", user)
            .order_desc("created_at")
            .limit(1);
        assert_eq!(query.path(), "/rest/v1/resume_analysis");
        assert_eq!(
            query.params(),
            vec![
                (
                    "user_id".to_string(),
                    "eq.00000000-0000-0000-0000-000000000000".to_string()
                ),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_without_order_or_limit() {
        let query = Query::table(PROJECT_PROGRESS)
            .eq("user_id", "u1")
            .eq("project_id", "resume-ai");
        assert_eq!(query.params().len(), 2);
        assert_eq!(query.params()[1].1, "eq.resume-ai");
    }
}
