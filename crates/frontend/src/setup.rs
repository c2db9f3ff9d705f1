//! Wiring of the lifecycle core to browser services

use crate::activity::DomActivitySource;
use crate::client::{ApiClient, HttpTokenRenewer};
use crate::runtime::BrowserRuntime;
use crate::storage::BrowserStore;
use std::rc::Rc;
use tenure_core::{ServerErrorBus, SessionConfig, SessionManager, SessionResult};
use tracing::{info, warn};

/// A manager and the API client that shares its server error bus
pub struct BrowserSession {
    pub manager: SessionManager,
    pub client: ApiClient,
}

/// Build a [`SessionManager`] backed by the window's clock, `localStorage`,
/// input events and the server at `base_url`
pub fn browser_session(
    config: SessionConfig,
    base_url: impl Into<String>,
) -> SessionResult<BrowserSession> {
    if !BrowserStore::is_available() {
        warn!("localStorage is unavailable; the session will not survive a reload");
    }
    let errors = ServerErrorBus::new();
    let client = ApiClient::new(base_url, errors.clone());

    let manager = SessionManager::builder()
        .config(config)
        .runtime(Rc::new(BrowserRuntime::new()))
        .store(Rc::new(BrowserStore::new()))
        .activity_source(Rc::new(DomActivitySource::new()))
        .renewer(Rc::new(HttpTokenRenewer::new(client.clone())))
        .error_bus(errors)
        .build()?;

    info!(base_url = %client.base_url(), "Browser session manager ready");
    Ok(BrowserSession { manager, client })
}

/// [`browser_session`] against the origin serving the page
pub fn window_session(config: SessionConfig) -> SessionResult<BrowserSession> {
    browser_session(config, crate::client::window_origin())
}
