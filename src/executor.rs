use crate::config::HarvestConfig;
use crate::harvest::pipeline::PipelineError;
use crate::harvest::traits::PackageFormat;
use crate::model::PackageDescriptor;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument};

/// Runs extractions on the blocking pool, at most `concurrency_limit` at once.
pub struct HarvesterExecutor {
    semaphore: Arc<Semaphore>,
}

impl HarvesterExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.concurrency_limit)
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    #[instrument(skip(self, format, content), fields(format = format.name(), bytes = content.len()))]
    pub async fn execute(
        &self,
        format: Arc<dyn PackageFormat>,
        content: Arc<[u8]>,
    ) -> Result<PackageDescriptor, PipelineError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::Executor(format!("Semaphore error: {}", e)))?;

        info!("Starting extraction");

        let result = tokio::task::spawn_blocking(move || {
            let mut reader: &[u8] = &content;
            format.extract(&mut reader)
        })
        .await
        .map_err(|e| PipelineError::Executor(format!("Task join error: {}", e)))?;

        info!(success = result.is_ok(), "Finished extraction");
        Ok(result?)
    }
}
