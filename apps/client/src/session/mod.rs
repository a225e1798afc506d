//! Client-side session state: the cached signed-in user, the bootstrap run on every
//! mount of a protected view, and the redirect sink standing in for the UI router.

pub mod bootstrap;
pub mod navigator;
pub mod store;

pub use bootstrap::{Mount, SessionBootstrap, SessionGuard};
pub use navigator::{ChannelNavigator, Navigator, Route};
pub use store::{SessionStore, SessionUser};
