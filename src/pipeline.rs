use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::Instrument;

use crate::error::PipelineError;
use crate::event::ObjectRef;
use crate::keys::KeyPolicy;
use crate::plan::{VariantPlan, VariantSpec};
use crate::processor::resizer::render_on_pool;
use crate::processor::sniffer::{detect_on_pool, SniffedImage};
use crate::storage::{ObjectStore, StoredObject};
use crate::utils::with_deadline;

/// A successfully stored variant.
#[derive(Debug)]
pub struct StoredVariant {
    /// Where the storage backend put the variant.
    pub location: String,

    /// If the original bytes were used as is.
    pub passthrough: bool,

    pub size: usize,
}

/// The result of producing a single variant of an object.
#[derive(Debug)]
pub struct VariantReport {
    pub suffix: String,
    pub key: String,
    pub result: Result<StoredVariant, PipelineError>,
}

/// The terminal state of a single object.
#[derive(Debug)]
pub enum ObjectOutcome {
    /// The key is a variant produced by the pipeline itself.
    Skipped,

    /// The source was fetched and sniffed and every variant was attempted,
    /// some of them may still have failed.
    Done(Vec<VariantReport>),

    /// The source could not be fetched or is not a usable image.
    Failed(PipelineError),
}

impl ObjectOutcome {
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    #[inline]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct BatchReport {
    /// Every record of the batch, whatever happened to it.
    pub seen: usize,

    pub outcomes: Vec<(ObjectRef, ObjectOutcome)>,

    pub execution_time: Duration,
}

impl BatchReport {
    pub fn done(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_done()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    #[cfg(test)]
    pub fn outcome_of(&self, object: &ObjectRef) -> Option<&ObjectOutcome> {
        self.outcomes
            .iter()
            .find(|(obj, _)| obj == object)
            .map(|(_, outcome)| outcome)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records processed", self.seen)
    }
}

/// A fetched and sniffed source object, alive for one `process_one` call.
struct SourceObject {
    data: Bytes,
    cache_control: Option<String>,
    image: Arc<SniffedImage>,
}

pub struct Pipeline {
    plan: Arc<VariantPlan>,
    keys: KeyPolicy,
    storage: Arc<dyn ObjectStore>,
    object_concurrency: usize,
    variant_concurrency: usize,
}

impl Pipeline {
    pub fn new(plan: Arc<VariantPlan>, storage: Arc<dyn ObjectStore>) -> Self {
        let keys = KeyPolicy::new(&plan);

        Self {
            plan,
            keys,
            storage,
            object_concurrency: 1,
            variant_concurrency: 1,
        }
    }

    /// Sets how many objects and how many variants of each object are
    /// worked on at once.
    pub fn with_concurrency(mut self, objects: usize, variants: usize) -> Self {
        self.object_concurrency = objects.max(1);
        self.variant_concurrency = variants.max(1);
        self
    }

    #[inline]
    pub fn plan(&self) -> &VariantPlan {
        &self.plan
    }

    /// Handles every object of a delivered batch.
    ///
    /// A failing object never stops the rest of the batch, its failure is
    /// logged and recorded in the report.
    pub async fn handle_batch(&self, objects: Vec<ObjectRef>, deadline: Option<Instant>) -> BatchReport {
        let instant = StdInstant::now();
        let seen = objects.len();

        let outcomes = stream::iter(objects)
            .map(|object| async move {
                let outcome = self.handle_object(&object, deadline).await;
                (object, outcome)
            })
            .buffer_unordered(self.object_concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport {
            seen,
            outcomes,
            execution_time: instant.elapsed(),
        };

        info!(
            "Batch finished in {:?}: {} done, {} skipped, {} failed",
            report.execution_time,
            report.done(),
            report.skipped(),
            report.failed()
        );

        report
    }

    async fn handle_object(&self, object: &ObjectRef, deadline: Option<Instant>) -> ObjectOutcome {
        if self.keys.is_derivative(&object.key) {
            info!(bucket = %object.bucket, key = %object.key, "Ignoring object, it is a variant");
            return ObjectOutcome::Skipped;
        }

        let span = info_span!("object", bucket = %object.bucket, key = %object.key);
        async {
            match self.process_one(object, deadline).await {
                Ok(reports) => ObjectOutcome::Done(reports),
                Err(e) => {
                    error!("Failed to process object: {}", e);
                    ObjectOutcome::Failed(e)
                },
            }
        }
        .instrument(span)
        .await
    }

    /// Fetches and sniffs the object and attempts every variant of the plan.
    ///
    /// An error is returned only if the source itself is unusable, failed
    /// variants are reported individually.
    pub async fn process_one(
        &self,
        object: &ObjectRef,
        deadline: Option<Instant>,
    ) -> Result<Vec<VariantReport>, PipelineError> {
        let stored = self.fetch(object, deadline).await?;
        info!("Object downloaded, {} bytes", stored.data.len());

        let image = detect_on_pool(stored.data.clone()).await?;
        info!("Detected {} image of {}x{}", image.kind, image.width, image.height);

        let source = SourceObject {
            data: stored.data,
            cache_control: stored.cache_control,
            image: Arc::new(image),
        };

        let reports = stream::iter(self.plan.iter())
            .map(|spec| self.produce_variant(object, &source, spec, deadline))
            .buffer_unordered(self.variant_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(reports)
    }

    async fn fetch(&self, object: &ObjectRef, deadline: Option<Instant>) -> Result<StoredObject, PipelineError> {
        with_deadline(
            deadline,
            "fetching the source object",
            self.storage.get(&object.bucket, &object.key),
        )
        .await?
        .map_err(|e| PipelineError::Fetch { source: e.into() })?
        .ok_or_else(|| PipelineError::Fetch {
            source: format!("object {} does not exist", object).into(),
        })
    }

    async fn produce_variant(
        &self,
        object: &ObjectRef,
        source: &SourceObject,
        spec: &VariantSpec,
        deadline: Option<Instant>,
    ) -> VariantReport {
        let key = KeyPolicy::derived_key(&object.key, spec);
        let span = debug_span!("variant", suffix = spec.suffix());

        let result = self
            .render_and_store(object, source, spec, &key, deadline)
            .instrument(span)
            .await;

        let report = VariantReport {
            suffix: spec.suffix().to_owned(),
            key,
            result,
        };

        match report.result {
            Ok(ref stored) => {
                info!(
                    "Stored {} variant at {} ({} bytes, passthrough: {})",
                    spec, stored.location, stored.size, stored.passthrough
                );
            },
            Err(ref e) => {
                error!(
                    bucket = %object.bucket,
                    key = %report.key,
                    suffix = %report.suffix,
                    "Failed to produce variant: {}",
                    e
                );
            },
        }

        report
    }

    async fn render_and_store(
        &self,
        object: &ObjectRef,
        source: &SourceObject,
        spec: &VariantSpec,
        key: &str,
        deadline: Option<Instant>,
    ) -> Result<StoredVariant, PipelineError> {
        let rendered = with_deadline(
            deadline,
            "rendering a variant",
            render_on_pool(source.data.clone(), source.image.clone(), spec.width(), spec.height()),
        )
        .await??;

        let passthrough = rendered.is_passthrough();
        let size = rendered.bytes().len();
        let content_type = source.image.kind.mime();

        let location = with_deadline(
            deadline,
            "storing a variant",
            self.storage.put(
                &object.bucket,
                key,
                rendered.into_bytes(),
                content_type.as_ref(),
                source.cache_control.as_deref(),
            ),
        )
        .await?
        .map_err(|e| PipelineError::Store { source: e.into() })?;

        Ok(StoredVariant {
            location,
            passthrough,
            size,
        })
    }
}
