pub mod job;
pub mod profile;
pub mod project;
pub mod resume;

pub use job::{JobRecommendation, NewJobRecommendation};
pub use profile::{NewProfile, Profile, ProfileUpdate, DEFAULT_PROFILE_NAME};
pub use project::{Deliverable, NewProjectProgress, ProgressUpdate, ProjectProgress, ProjectStatus};
pub use resume::{
    AnalysisPayload, NewResumeAnalysis, RecommendedProject, ResumeAnalysis, SkillScore, Strength,
};
