use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{NewResumeAnalysis, ProfileUpdate, ResumeAnalysis};
use crate::services::Services;

pub const PDF: &str = "application/pdf";
pub const DOC: &str = "application/msword";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ACCEPTED: [(&str, &str); 3] = [(PDF, "pdf"), (DOC, "doc"), (DOCX, "docx")];

/// A résumé picked by the user, ready to upload.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, inferring its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = extension_of(&file_name)
            .and_then(|ext| {
                ACCEPTED
                    .iter()
                    .find(|(_, e)| *e == ext)
                    .map(|(mime, _)| mime.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Self::new(file_name, content_type, bytes))
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Checks the declared content type and picks the object extension.
fn accepted_extension(file: &ResumeFile) -> Result<String, ServiceError> {
    let content_type = file.content_type.trim().to_ascii_lowercase();
    let (_, default_ext) = ACCEPTED
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .ok_or_else(|| {
            ServiceError::Validation("Please upload a PDF or Word document".to_string())
        })?;
    if file.bytes.is_empty() {
        return Err(ServiceError::Validation("The selected file is empty".to_string()));
    }
    Ok(extension_of(&file.file_name)
        .filter(|ext| ACCEPTED.iter().any(|(_, known)| known == ext))
        .unwrap_or_else(|| default_ext.to_string()))
}

/// Object key for an upload: `{user_id}/{unix_millis}.{ext}`.
pub fn resume_object_path(user_id: Uuid, at: DateTime<Utc>, ext: &str) -> String {
    format!("{user_id}/{}.{ext}", at.timestamp_millis())
}

impl Services {
    /// Stores the file and points the profile at it. Returns the public URL.
    ///
    /// The file type is checked before the session so a rejected file makes no
    /// backend call at all.
    pub async fn upload_resume(&self, file: ResumeFile) -> Result<String, ServiceError> {
        let ext = accepted_extension(&file)?;
        let id = self.identity().await?;

        let path = resume_object_path(id, Utc::now(), &ext);
        self.backend
            .blobs
            .upload(&path, file.bytes, &file.content_type)
            .await?;
        let url = self.backend.blobs.public_url(&path);

        if let Err(e) = self
            .backend
            .rows
            .update_profile(id, &ProfileUpdate::resume_url(&url))
            .await
        {
            warn!("Profile update after upload failed for user {id}, removing {path}");
            if let Err(remove_err) = self.backend.blobs.remove(&path).await {
                error!("Could not remove orphaned upload {path}: {remove_err}");
            }
            return Err(e.into());
        }

        self.store
            .update_for(id, |user| user.resume_url = Some(url.clone()));
        info!("Uploaded résumé for user {id} to {path}");
        Ok(url)
    }

    /// Runs the analyzer, stores a new analysis row and refreshes job matches.
    pub async fn analyze_resume(&self, resume_url: &str) -> Result<ResumeAnalysis, ServiceError> {
        let id = self.identity().await?;
        if resume_url.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Upload a résumé before requesting an analysis".to_string(),
            ));
        }

        info!(
            "Analyzing résumé for user {id} with the {} analyzer",
            self.analyzer.backend_name()
        );
        let payload = self.analyzer.analyze(resume_url).await?;
        let analysis = self
            .backend
            .rows
            .insert_analysis(&NewResumeAnalysis {
                user_id: id,
                resume_url: resume_url.to_string(),
                payload,
            })
            .await?;

        // The analysis is already stored; stale matches are not worth failing over.
        if let Err(e) = self.regenerate_job_recommendations(id).await {
            warn!("Job recommendation refresh failed for user {id}: {e}");
        }
        Ok(analysis)
    }

    /// Most recent analysis for the caller, if any.
    pub async fn latest_analysis(&self) -> Result<Option<ResumeAnalysis>, ServiceError> {
        let id = self.identity().await?;
        Ok(self.backend.rows.latest_analysis(id).await?)
    }
}
