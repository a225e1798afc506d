use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use futureu_client::analysis::{MockJobMatcher, MockResumeAnalyzer};
use futureu_client::backend::auth::OAuthProvider;
use futureu_client::backend::Backend;
use futureu_client::config::Config;
use futureu_client::errors::ServiceError;
use futureu_client::oauth::CallbackServer;
use futureu_client::services::{ResumeFile, Services};
use futureu_client::session::{ChannelNavigator, Mount, Route, SessionBootstrap, SessionStore};

const OAUTH_WAIT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("futureu_client={0},futureu={0}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FutureU client v{}", env!("CARGO_PKG_VERSION"));

    let backend = Backend::connect(&config).await?;
    let store = SessionStore::new();
    let services = Services::new(backend.clone(), store.clone())
        .with_analyzer(Arc::new(MockResumeAnalyzer::with_delay(
            config.mock_analysis_delay,
        )))
        .with_matcher(Arc::new(MockJobMatcher::with_delay(
            config.mock_matching_delay,
        )));

    if services.resume_session().await?.is_none() {
        sign_in(&services, &config).await?;
    }

    let (navigator, mut redirects) = ChannelNavigator::new();
    let bootstrap = SessionBootstrap::new(backend, store, Arc::new(navigator));

    let mount = bootstrap.mount().await;
    let user = match &mount {
        Mount::Ready { user, .. } => user.clone(),
        Mount::Redirected(route) => bail!("Bootstrap redirected to {}", route.path()),
    };
    info!("Dashboard for {} <{}>", user.full_name, user.email);

    if let Ok(path) = std::env::var("FUTUREU_RESUME") {
        let file = ResumeFile::from_path(&path).await?;
        let url = services.upload_resume(file).await?;
        let analysis = services.analyze_resume(&url).await?;
        info!(
            "Analysis: {} strengths, {} gaps, {} recommended projects",
            analysis.payload.strengths.len(),
            analysis.payload.gaps.len(),
            analysis.payload.recommended_projects.len()
        );
    }

    match services.latest_analysis().await? {
        Some(analysis) => info!("Latest analysis from {}", analysis.created_at),
        None => info!("No résumé analysed yet"),
    }
    for job in services.job_recommendations().await? {
        info!("{}% {} at {}", job.match_score, job.position, job.company);
    }

    info!("Waiting for sign-out (Ctrl-C to sign out and exit)");
    tokio::select! {
        route = redirects.recv() => {
            if route == Some(Route::Entry) {
                info!("Signed out elsewhere, exiting");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            if let Err(e) = services.sign_out().await {
                warn!("Sign-out failed: {e}");
            }
        }
    }

    drop(mount);
    Ok(())
}

/// Password sign-in from FUTUREU_EMAIL / FUTUREU_PASSWORD, else OAuth through the
/// loopback listener.
async fn sign_in(services: &Services, config: &Config) -> Result<()> {
    if let (Ok(email), Ok(password)) = (
        std::env::var("FUTUREU_EMAIL"),
        std::env::var("FUTUREU_PASSWORD"),
    ) {
        match services.sign_in(&email, &password).await {
            Ok(user) => {
                info!("Signed in as {}", user.email);
                return Ok(());
            }
            Err(ServiceError::EmailNotConfirmed) => {
                bail!("{}", ServiceError::EmailNotConfirmed.user_message())
            }
            Err(e) => return Err(e.into()),
        }
    }

    let provider = match std::env::var("FUTUREU_OAUTH_PROVIDER").as_deref() {
        Ok("github") => OAuthProvider::Github,
        _ => OAuthProvider::Google,
    };
    let server = CallbackServer::bind(config.oauth_callback_port).await?;
    let url = services.oauth_authorize_url(provider, &server.redirect_url())?;
    info!("Open this URL to sign in: {url}");

    let code = server.wait_for_code(OAUTH_WAIT).await?;
    let user = services.complete_oauth(&code).await?;
    info!("Signed in as {}", user.email);
    Ok(())
}
