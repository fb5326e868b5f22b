use std::sync::Arc;
use tracing::{debug, info, warn};

use super::matcher::PatternMatcher;
use super::processor::FileProcessor;
use crate::config::ScanConfig;
use crate::errors::SearchResult;
use crate::filters::plan_work;
use crate::metrics::ScanMetrics;
use crate::progress::ProgressReporter;
use crate::results::ScanSummary;
use crate::scheduler::WorkScheduler;
use crate::sink::ResultSink;
use crate::source::MessageSource;

/// Scans the configured channel for `term`.
///
/// Matches and failures are appended to the configured artifacts as they
/// happen; the returned summary only counts them. An invalid term or an
/// unreachable channel fails before anything is written.
pub async fn run_scan<S>(
    config: &ScanConfig,
    term: &str,
    source: Arc<S>,
    progress: &dyn ProgressReporter,
) -> SearchResult<ScanSummary>
where
    S: MessageSource + 'static,
{
    let matcher = PatternMatcher::new(term)?;
    info!(
        "Starting scan of {} for {:?}",
        config.channel,
        matcher.pattern()
    );

    source.connect().await?;
    let channel = source.resolve_channel(&config.channel).await?;
    let messages = source.list_messages(&channel).await?;
    debug!("Channel {} has {} messages", channel.name, messages.len());

    let plan = plan_work(messages, term);
    info!(
        "{} attachments to search, {} skipped",
        plan.items.len(),
        plan.skipped
    );

    let metrics = ScanMetrics::new();
    let sink = ResultSink::new(&config.results_file, &config.errors_file);
    let processor = FileProcessor::new(matcher, sink, metrics.clone(), config.max_archive_depth);
    let scheduler = WorkScheduler::new(
        config,
        Arc::clone(&source),
        channel,
        processor,
        metrics.clone(),
    )?;

    let mut summary = scheduler.run(plan.items, progress).await;
    summary.items_skipped = plan.skipped;

    if let Err(e) = source.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    metrics.log_stats();
    summary.stats = metrics.get_stats();
    info!(
        "Scan finished: {} attachments, {} files searched, {} matches, {} failed",
        summary.items_scheduled,
        summary.output.files_searched,
        summary.output.total_matches,
        summary.items_failed
    );
    Ok(summary)
}
