//! Browser binding of the tenure session lifecycle
//!
//! Implements the core's host seams with `web-sys`, `gloo` and `reqwest`,
//! and provides the Yew provider, hooks and components around a
//! [`SessionManager`](tenure_core::SessionManager).

pub mod activity;
pub mod animation;
pub mod auth;
pub mod client;
pub mod components;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod setup;
pub mod storage;

pub use activity::DomActivitySource;
pub use animation::{AnimationProvider, AnimationSettings, RouteAnimation};
pub use auth::{SessionContext, SessionProvider, use_is_authenticated, use_session};
pub use client::{ApiClient, HttpTokenRenewer};
pub use components::{ExpiryPromptModal, RequireSession, Spinner};
pub use error::ClientError;
pub use logging::init_logging;
pub use runtime::BrowserRuntime;
pub use setup::{BrowserSession, browser_session, window_session};
pub use storage::BrowserStore;
