use std::{ops::Deref, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::info;

use carlot_decision::{AllowPath, Decider, EmbeddedDecider};
use carlot_slo::errors;
use carlot_storage::FileStore;

use crate::AppConfig;

pub struct App {
    pub config: AppConfig,
    pub store: FileStore,
    /// Decision provider, or `None` for the fail-open disabled mode.
    pub decider: Option<Arc<dyn Decider>>,
    /// Handle to the embedded engine when running in embedded mode,
    /// kept for the reload loop and the playground heartbeat.
    pub embedded: Option<Arc<EmbeddedDecider>>,
    pub allow_path: AllowPath,
}

impl App {
    pub fn new(
        config: AppConfig,
        store: FileStore,
        decider: Option<Arc<dyn Decider>>,
    ) -> Result<Self> {
        let allow_path = AllowPath::parse(&config.allow_path)?;
        info!(
            "authorization configured: mode {:?}, allow path '{}'",
            config.mode, config.allow_path
        );
        Ok(Self {
            config,
            store,
            decider,
            embedded: None,
            allow_path,
        })
    }

    pub fn with_embedded(mut self, engine: Arc<EmbeddedDecider>) -> Self {
        self.embedded = Some(engine);
        self
    }
}

#[derive(Clone)]
pub struct AppState(pub Arc<App>);

// deref so you can still access the inner fields easily
impl Deref for AppState {
    type Target = App;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AppState
where
    Self: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = errors::WithBacktrace;
    async fn from_request_parts(
        _: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}
