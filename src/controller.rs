use std::sync::Arc;

use tokio::time::Instant;

use crate::config::RuntimeConfig;
use crate::error::PipelineError;
use crate::event::S3Event;
use crate::pipeline::{BatchReport, Pipeline};
use crate::plan::VariantPlan;
use crate::storage::ObjectStore;

/// Ties the configured plan and storage together and handles
/// incoming notifications.
pub struct EventController {
    pipeline: Pipeline,
}

impl EventController {
    /// Builds the variant plan from the config.
    ///
    /// This is the only place a fatal error can come from, a bad plan means
    /// nothing can be processed at all.
    pub fn from_config(
        cfg: &RuntimeConfig,
        storage: Arc<dyn ObjectStore>,
    ) -> Result<Self, PipelineError> {
        let plan = VariantPlan::from_entries(&cfg.target_sizes)?;
        let pipeline = Pipeline::new(Arc::new(plan), storage)
            .with_concurrency(cfg.object_concurrency, cfg.variant_concurrency);

        let plan = pipeline.plan();
        info!(
            "Loaded {} target sizes: {}",
            plan.len(),
            plan.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
        );

        Ok(Self { pipeline })
    }

    #[cfg(test)]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn handle(&self, event: &S3Event, deadline: Option<Instant>) -> BatchReport {
        debug!("Received event {:?}", event);
        self.pipeline.handle_batch(event.objects(), deadline).await
    }
}

/// Handles a single invocation, returning the summary of the batch.
///
/// Individual objects failing never fail the invocation, only a
/// configuration without any usable target sizes does.
pub async fn handle(
    cfg: &RuntimeConfig,
    storage: Arc<dyn ObjectStore>,
    event: &S3Event,
    deadline: Option<Instant>,
) -> anyhow::Result<String> {
    let controller = match EventController::from_config(cfg, storage) {
        Ok(controller) => controller,
        Err(e) if e.is_fatal() => {
            error!("Refusing to process the event, the target sizes are unusable: {}", e);
            return Err(e.into());
        },
        Err(e) => return Err(e.into()),
    };
    let report = controller.handle(event, deadline).await;

    Ok(report.to_string())
}
