//! In-process implementations of the three facade traits.
//!
//! Used by the test suites and for offline runs. Every store keeps a call log and
//! supports failure injection per operation name, so callers can assert which
//! backend calls were (or were not) made.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::auth::{
    AuthProvider, AuthUser, OAuthProvider, Session, SessionCell, SignUpMetadata, SignUpResult,
};
use crate::backend::storage::BlobStore;
use crate::backend::Backend;
use crate::backend::store::RowStore;
use crate::errors::BackendError;
use crate::models::{
    JobRecommendation, NewJobRecommendation, NewProfile, NewProjectProgress, NewResumeAnalysis,
    Profile, ProfileUpdate, ProgressUpdate, ProjectProgress, ResumeAnalysis,
};

/// Call log plus the set of operations that should fail.
#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl CallLog {
    fn enter(&self, op: &'static str) -> Result<(), BackendError> {
        self.calls.lock().push(op);
        if self.failing.lock().contains(op) {
            return Err(BackendError::Api {
                status: 500,
                message: format!("injected failure in {op}"),
            });
        }
        Ok(())
    }

    fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    fn heal(&self, op: &'static str) {
        self.failing.lock().remove(op);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == op).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

struct Account {
    id: Uuid,
    password: String,
    confirmed: bool,
}

pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    oauth_codes: Mutex<HashMap<String, String>>,
    resent: Mutex<Vec<String>>,
    auto_confirm: bool,
    session: SessionCell,
    log: CallLog,
}

impl MemoryAuth {
    /// `auto_confirm` decides whether sign-up signs the user in straight away.
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            oauth_codes: Mutex::new(HashMap::new()),
            resent: Mutex::new(Vec::new()),
            auto_confirm,
            session: SessionCell::new(),
            log: CallLog::default(),
        }
    }

    pub fn register(&self, email: &str, password: &str, confirmed: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().insert(
            email.to_string(),
            Account {
                id,
                password: password.to_string(),
                confirmed,
            },
        );
        id
    }

    /// Puts a session in place without going through a sign-in call.
    pub fn sign_in_as(&self, id: Uuid, email: &str) -> Session {
        let session = session_for(id, email);
        self.session.set(Some(session.clone()));
        session
    }

    /// Hands out a one-time code as the OAuth provider would on its redirect.
    pub fn issue_oauth_code(&self, email: &str) -> String {
        let code = Uuid::new_v4().simple().to_string();
        self.oauth_codes
            .lock()
            .insert(code.clone(), email.to_string());
        code
    }

    pub fn resent_confirmations(&self) -> Vec<String> {
        self.resent.lock().clone()
    }

    pub fn fail(&self, op: &'static str) {
        self.log.fail(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.calls()
    }

    fn confirmed_account(&self, email: &str) -> Result<Uuid, BackendError> {
        let accounts = self.accounts.lock();
        let account = accounts.get(email).ok_or_else(invalid_credentials)?;
        if !account.confirmed {
            return Err(BackendError::EmailNotConfirmed);
        }
        Ok(account.id)
    }
}

fn session_for(id: Uuid, email: &str) -> Session {
    Session {
        access_token: format!("memory-{}", Uuid::new_v4().simple()),
        refresh_token: None,
        expires_at: None,
        user: AuthUser {
            id,
            email: Some(email.to_string()),
        },
    }
}

fn invalid_credentials() -> BackendError {
    BackendError::Api {
        status: 400,
        message: "Invalid login credentials".to_string(),
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        self.log.enter("sign_in_with_password")?;
        let id = {
            let accounts = self.accounts.lock();
            match accounts.get(email) {
                Some(account) if account.password == password => {
                    if !account.confirmed {
                        return Err(BackendError::EmailNotConfirmed);
                    }
                    account.id
                }
                _ => return Err(invalid_credentials()),
            }
        };
        Ok(self.sign_in_as(id, email))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: &SignUpMetadata,
        _redirect_to: Option<&str>,
    ) -> Result<SignUpResult, BackendError> {
        self.log.enter("sign_up")?;
        if self.accounts.lock().contains_key(email) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let id = self.register(email, password, self.auto_confirm);
        if self.auto_confirm {
            Ok(SignUpResult::Session(self.sign_in_as(id, email)))
        } else {
            Ok(SignUpResult::ConfirmationRequired(AuthUser {
                id,
                email: Some(email.to_string()),
            }))
        }
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError> {
        Ok(format!(
            "memory://authorize?provider={}&redirect_to={}",
            provider.as_str(),
            redirect_to
        ))
    }

    async fn exchange_code_for_session(&self, code: &str) -> Result<Session, BackendError> {
        self.log.enter("exchange_code_for_session")?;
        let email = self
            .oauth_codes
            .lock()
            .remove(code)
            .ok_or_else(|| BackendError::Api {
                status: 400,
                message: "invalid flow state".to_string(),
            })?;
        let id = self.confirmed_account(&email)?;
        Ok(self.sign_in_as(id, &email))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.log.enter("sign_out")?;
        self.session.set(None);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.log.enter("get_session")?;
        Ok(self.session.current())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), BackendError> {
        self.log.enter("resend_confirmation")?;
        self.resent.lock().push(email.to_string());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    analyses: Vec<ResumeAnalysis>,
    progress: Vec<ProjectProgress>,
    jobs: Vec<JobRecommendation>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    log: CallLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str) {
        self.log.fail(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.log.heal(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.calls()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.log.count(op)
    }

    pub fn profile_count(&self) -> usize {
        self.tables.lock().profiles.len()
    }

    pub fn analysis_count(&self, user_id: Uuid) -> usize {
        self.tables
            .lock()
            .analyses
            .iter()
            .filter(|a| a.user_id == user_id)
            .count()
    }

    /// Every recommendation row, all users included.
    pub fn all_job_recommendations(&self) -> Vec<JobRecommendation> {
        self.tables.lock().jobs.clone()
    }

    /// Seeds a row directly, bypassing the call log.
    pub fn seed_job_recommendation(&self, row: NewJobRecommendation) {
        self.tables.lock().jobs.push(materialize_job(&row));
    }
}

fn materialize_job(row: &NewJobRecommendation) -> JobRecommendation {
    JobRecommendation {
        id: Uuid::new_v4(),
        user_id: row.user_id,
        company: row.company.clone(),
        position: row.position.clone(),
        location: row.location.clone(),
        salary: row.salary.clone(),
        match_score: row.match_score,
        match_reason: row.match_reason.clone(),
        tags: row.tags.clone(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Profile>, BackendError> {
        self.log.enter("fetch_profile")?;
        Ok(self.tables.lock().profiles.get(&id).cloned())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        self.log.enter("insert_profile")?;
        let mut tables = self.tables.lock();
        if tables.profiles.contains_key(&profile.id) {
            return Err(BackendError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint \"profiles_pkey\""
                    .to_string(),
            });
        }
        let now = Utc::now();
        let row = Profile {
            id: profile.id,
            name: profile.name.clone(),
            education: profile.education.clone(),
            career_goal: profile.career_goal.clone(),
            resume_url: profile.resume_url.clone(),
            linkedin_url: profile.linkedin_url.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), BackendError> {
        self.log.enter("update_profile")?;
        if let Some(row) = self.tables.lock().profiles.get_mut(&id) {
            update.apply_to(row);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_analysis(
        &self,
        analysis: &NewResumeAnalysis,
    ) -> Result<ResumeAnalysis, BackendError> {
        self.log.enter("insert_analysis")?;
        let row = ResumeAnalysis {
            id: Uuid::new_v4(),
            user_id: analysis.user_id,
            resume_url: analysis.resume_url.clone(),
            payload: analysis.payload.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().analyses.push(row.clone());
        Ok(row)
    }

    async fn latest_analysis(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ResumeAnalysis>, BackendError> {
        self.log.enter("latest_analysis")?;
        Ok(self
            .tables
            .lock()
            .analyses
            .iter()
            .filter(|a| a.user_id == user_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        project_id: &str,
    ) -> Result<Option<ProjectProgress>, BackendError> {
        self.log.enter("find_progress")?;
        Ok(self
            .tables
            .lock()
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.project_id == project_id)
            .cloned())
    }

    async fn insert_progress(
        &self,
        progress: &NewProjectProgress,
    ) -> Result<ProjectProgress, BackendError> {
        self.log.enter("insert_progress")?;
        let mut tables = self.tables.lock();
        if tables
            .progress
            .iter()
            .any(|p| p.user_id == progress.user_id && p.project_id == progress.project_id)
        {
            return Err(BackendError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        let now = Utc::now();
        let row = ProjectProgress {
            id: Uuid::new_v4(),
            user_id: progress.user_id,
            project_id: progress.project_id.clone(),
            status: progress.status,
            progress: progress.progress,
            deliverables: progress.deliverables.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.progress.push(row.clone());
        Ok(row)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        update: &ProgressUpdate,
    ) -> Result<(), BackendError> {
        self.log.enter("update_progress")?;
        if let Some(row) = self.tables.lock().progress.iter_mut().find(|p| p.id == id) {
            update.apply_to(row);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_job_recommendations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        self.log.enter("list_job_recommendations")?;
        let mut rows: Vec<JobRecommendation> = self
            .tables
            .lock()
            .jobs
            .iter()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        Ok(rows)
    }

    async fn delete_job_recommendations(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.log.enter("delete_job_recommendations")?;
        self.tables.lock().jobs.retain(|j| j.user_id != user_id);
        Ok(())
    }

    async fn insert_job_recommendations(
        &self,
        rows: &[NewJobRecommendation],
    ) -> Result<Vec<JobRecommendation>, BackendError> {
        self.log.enter("insert_job_recommendations")?;
        let inserted: Vec<JobRecommendation> = rows.iter().map(materialize_job).collect();
        self.tables.lock().jobs.extend(inserted.iter().cloned());
        Ok(inserted)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Blob storage
// ────────────────────────────────────────────────────────────────────────────

pub struct MemoryBlobStore {
    bucket: String,
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    log: CallLog,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            log: CallLog::default(),
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.log.fail(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.calls()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().contains_key(path)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.lock().get(path).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        self.log.enter("upload")?;
        let mut objects = self.objects.lock();
        if objects.contains_key(path) {
            return Err(BackendError::AlreadyExists(path.to_string()));
        }
        objects.insert(path.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path)
    }

    async fn remove(&self, path: &str) -> Result<(), BackendError> {
        self.log.enter("remove")?;
        self.objects.lock().remove(path);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bundle
// ────────────────────────────────────────────────────────────────────────────

/// The three in-memory clients with typed handles kept for inspection.
#[derive(Clone)]
pub struct MemoryBackend {
    pub auth: Arc<MemoryAuth>,
    pub rows: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(MemoryAuth::new(true)),
            rows: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new("resumes")),
        }
    }

    pub fn backend(&self) -> Backend {
        Backend::new(self.auth.clone(), self.rows.clone(), self.blobs.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
