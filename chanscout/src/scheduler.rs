/// Admission, retry and completion of work items.
///
/// Every work item runs as its own task. An attempt holds one download permit
/// from the time the download starts until its text has been searched, so at
/// most `semaphore_limit` attachments are downloading or being searched at any
/// moment. Archive walks are handed to the [`WorkerPool`] on top of that.
///
/// Transient failures (rate limiting, dropped connections) put the item into a
/// retry wait with the permit released; anything else fails the item and the
/// scan moves on.
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ScanConfig;
use crate::errors::{RetryHint, SearchError, SearchResult};
use crate::metrics::ScanMetrics;
use crate::pool::WorkerPool;
use crate::progress::ProgressReporter;
use crate::results::{FailureRecord, ItemReport, ItemStatus, ParentArchive, ScanSummary, SearchOutput};
use crate::search::format::FileFormat;
use crate::search::processor::FileProcessor;
use crate::source::{ChannelHandle, MessageSource, WorkItem};

/// How transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub reconnect_delay: Duration,
    /// Retries allowed per item; `None` retries until the item succeeds
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    fn allows_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts <= max)
    }
}

impl From<&ScanConfig> for RetryPolicy {
    fn from(config: &ScanConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay,
            max_retries: config.max_retries,
        }
    }
}

/// Runs work items against a message source
pub struct WorkScheduler<S: MessageSource + 'static> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    source: Arc<S>,
    channel: ChannelHandle,
    processor: Arc<FileProcessor>,
    pool: WorkerPool,
    downloads: Semaphore,
    metrics: ScanMetrics,
    retry: RetryPolicy,
    pacing_delay: Duration,
}

impl<S: MessageSource + 'static> WorkScheduler<S> {
    pub fn new(
        config: &ScanConfig,
        source: Arc<S>,
        channel: ChannelHandle,
        processor: FileProcessor,
        metrics: ScanMetrics,
    ) -> SearchResult<Self> {
        let pool = WorkerPool::new(config.max_workers, metrics.clone())?;
        Ok(Self {
            inner: Arc::new(Inner {
                source,
                channel,
                processor: Arc::new(processor),
                pool,
                downloads: Semaphore::new(config.semaphore_limit.get()),
                metrics,
                retry: RetryPolicy::from(config),
                pacing_delay: config.pacing_delay,
            }),
        })
    }

    /// Runs every item to completion and folds their reports, in completion
    /// order
    pub async fn run(&self, items: Vec<WorkItem>, progress: &dyn ProgressReporter) -> ScanSummary {
        let total = items.len();
        let mut summary = ScanSummary::new();
        summary.items_scheduled = total;
        info!(
            "Scheduling {} attachments, {} downloads at a time",
            total,
            self.inner.downloads.available_permits()
        );

        progress.start(total);
        let mut tasks = JoinSet::new();
        for item in items {
            let inner = Arc::clone(&self.inner);
            tasks.spawn(async move { inner.process_item(item).await });
        }

        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok(report) => {
                    debug!(
                        "Message {} finished after {} attempt(s)",
                        report.message_id, report.attempts
                    );
                    summary.add_report(report);
                }
                Err(e) => {
                    error!("Work item task aborted: {}", e);
                    summary.items_failed += 1;
                }
            }
            progress.advance(completed, total);

            if completed < total && !self.inner.pacing_delay.is_zero() {
                tokio::time::sleep(self.inner.pacing_delay).await;
            }
        }
        progress.finish();

        summary
    }
}

impl<S: MessageSource + 'static> Inner<S> {
    async fn process_item(&self, item: WorkItem) -> ItemReport {
        let format = FileFormat::classify(&item.attachment.name);
        let mut attempts = 0;

        let status_and_output = loop {
            attempts += 1;
            let outcome = match self.downloads.acquire().await {
                Ok(_permit) => {
                    let _in_flight = self.metrics.enter_in_flight();
                    self.attempt(&item, format).await
                }
                Err(_) => Err(SearchError::worker_pool("download limiter closed")),
            };

            let error = match outcome {
                Ok(output) => break (ItemStatus::Done, output),
                Err(e) => e,
            };

            match error.retry_hint() {
                Some(hint) if self.retry.allows_retry(attempts) => {
                    self.wait_for_retry(&item, hint).await;
                }
                hint => {
                    if hint.is_some() {
                        error!(
                            "Giving up on message {} after {} attempts: {}",
                            item.message_id, attempts, error
                        );
                    } else {
                        error!(
                            "Error processing file {} from message {}: {}",
                            item.attachment.name, item.message_id, error
                        );
                    }
                    self.processor.sink().record_failure(&FailureRecord::error(
                        &item.attachment.name,
                        None,
                        &error,
                    ));
                    let mut output = SearchOutput::new();
                    output.add_failure();
                    break (ItemStatus::Failed(error.to_string()), output);
                }
            }
        };

        let (status, output) = status_and_output;
        ItemReport {
            message_id: item.message_id,
            attachment: item.attachment.name,
            format,
            attempts,
            output,
            status,
        }
    }

    async fn wait_for_retry(&self, item: &WorkItem, hint: RetryHint) {
        match hint {
            RetryHint::After(delay) => {
                self.metrics.record_rate_limit();
                warn!(
                    "Rate limited on message {}, retrying in {:?}",
                    item.message_id, delay
                );
                tokio::time::sleep(delay).await;
            }
            RetryHint::Reconnect => {
                self.metrics.record_connection_reset();
                warn!(
                    "Connection reset on message {}, reconnecting in {:?}",
                    item.message_id, self.retry.reconnect_delay
                );
                tokio::time::sleep(self.retry.reconnect_delay).await;
                if let Err(e) = self.source.connect().await {
                    warn!("Reconnect failed: {}", e);
                }
            }
        }
    }

    /// One download-and-search attempt. The staged download is removed when
    /// the attempt ends, whatever the outcome.
    async fn attempt(&self, item: &WorkItem, format: FileFormat) -> SearchResult<SearchOutput> {
        let staged = tempfile::NamedTempFile::new()?;
        let mut dest = tokio::fs::File::from_std(staged.reopen()?);
        debug!(
            "Downloading {} from message {}",
            item.attachment.name, item.message_id
        );
        let bytes = self.source.download(&self.channel, item, &mut dest).await?;
        dest.flush().await?;
        drop(dest);
        self.metrics.record_download(bytes);

        let path = staged.path().to_path_buf();
        let processor = Arc::clone(&self.processor);
        let output = match format {
            FileFormat::Archive(kind) => {
                let parent = ParentArchive::new(item.message_id, item.attachment.name.clone());
                self.pool
                    .run(move || processor.search_archive(&path, kind, &parent))
                    .await??
            }
            _ => {
                let name = item.attachment.name.clone();
                tokio::task::spawn_blocking(move || processor.search_file(&path, &name))
                    .await
                    .map_err(|e| SearchError::worker_pool(e.to_string()))?
            }
        };
        drop(staged);
        Ok(output)
    }
}
