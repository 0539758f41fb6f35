//! Model boundary.
//!
//! The relay owns exactly one [`MonitorModel`] per process, wrapped in a
//! [`RegisteredModel`] at startup. Registration fails fast when the model has
//! no name.

pub mod score;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use monrelay_core::error::{RelayError, Result};
use monrelay_core::model::{ModelResponse, RequestContext};
use monrelay_core::protocol::ExtractedPayload;

pub use score::ScoreModel;

/// A scoring model the relay delegates to.
#[async_trait]
pub trait MonitorModel: Send + Sync {
    fn name(&self) -> &str;
    async fn process(&self, payload: ExtractedPayload, ctx: RequestContext) -> Result<ModelResponse>;
}

/// The single model instance a server owns.
#[derive(Clone)]
pub struct RegisteredModel {
    inner: Arc<dyn MonitorModel>,
}

impl RegisteredModel {
    pub fn register(model: Arc<dyn MonitorModel>) -> Result<Self> {
        if model.name().trim().is_empty() {
            return Err(RelayError::Registration(
                "model name must be provided".into(),
            ));
        }
        tracing::info!(model = %model.name(), "registering model");
        Ok(Self { inner: model })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Invoke the model, bounded by `timeout` when one is given. Dropping the
    /// returned future cancels the call.
    pub async fn process(
        &self,
        payload: ExtractedPayload,
        ctx: RequestContext,
        timeout: Option<Duration>,
    ) -> Result<ModelResponse> {
        let call = self.inner.process(payload, ctx);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RelayError::Model(format!(
                    "{} did not answer within {}ms",
                    self.name(),
                    limit.as_millis()
                ))
            })?,
            None => call.await,
        }
    }
}
