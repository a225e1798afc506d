use tokio::sync::mpsc;

/// Views the application can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Sign-in / registration page. The only unprotected route.
    Entry,
    Dashboard,
    Upload,
    Results,
    Project,
    Jobs,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Entry => "/",
            Route::Dashboard => "/dashboard",
            Route::Upload => "/upload",
            Route::Results => "/results",
            Route::Project => "/project",
            Route::Jobs => "/jobs",
        }
    }
}

/// Redirect sink. The presentation layer implements it over its router.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: Route);
}

/// Forwards redirects into a channel the caller drains.
#[derive(Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn redirect(&self, route: Route) {
        // Receiver gone means nobody renders anymore; nothing to redirect.
        let _ = self.tx.send(route);
    }
}
