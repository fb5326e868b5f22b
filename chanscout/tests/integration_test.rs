use anyhow::Result;
use async_trait::async_trait;
use chanscout::errors::SourceError;
use chanscout::results::ItemStatus;
use chanscout::source::{Attachment, ChannelHandle, Message, MessageId, WorkItem};
use chanscout::{run_scan, DirectorySource, MessageSource, ScanConfig, SearchError, SilentProgress};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use zip::write::SimpleFileOptions;

/// In-memory channel with scripted transient failures
#[derive(Default)]
struct ScriptedSource {
    messages: Vec<Message>,
    content: HashMap<MessageId, Vec<u8>>,
    failures: Mutex<HashMap<MessageId, VecDeque<SourceError>>>,
    attempts: Mutex<Vec<(MessageId, Instant)>>,
    download_delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    connects: AtomicUsize,
}

impl ScriptedSource {
    fn new() -> Self {
        Self::default()
    }

    fn with_file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        let id = self.messages.len() as MessageId + 1;
        self.messages.push(Message {
            id,
            attachment: Some(Attachment {
                name: name.to_string(),
                size: None,
            }),
        });
        self.content.insert(id, content.into());
        self
    }

    fn with_text_message(mut self) -> Self {
        let id = self.messages.len() as MessageId + 1;
        self.messages.push(Message {
            id,
            attachment: None,
        });
        self
    }

    fn failing(self, id: MessageId, errors: Vec<SourceError>) -> Self {
        self.failures.lock().unwrap().insert(id, errors.into());
        self
    }

    fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    fn attempts_for(&self, id: MessageId) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn connect(&self) -> Result<(), SourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle, SourceError> {
        Ok(ChannelHandle {
            name: name.to_string(),
            key: name.to_string(),
        })
    }

    async fn list_messages(&self, _channel: &ChannelHandle) -> Result<Vec<Message>, SourceError> {
        Ok(self.messages.clone())
    }

    async fn download(
        &self,
        _channel: &ChannelHandle,
        item: &WorkItem,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, SourceError> {
        self.attempts
            .lock()
            .unwrap()
            .push((item.message_id, Instant::now()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&item.message_id)
            .and_then(|queue| queue.pop_front());
        let result = match failure {
            Some(error) => Err(error),
            None => {
                let content = self
                    .content
                    .get(&item.message_id)
                    .ok_or(SourceError::MissingAttachment(item.message_id))?;
                dest.write_all(content).await?;
                Ok(content.len() as u64)
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn test_config(dir: &TempDir) -> ScanConfig {
    let mut config = ScanConfig::for_channel("test-channel");
    config.results_file = dir.path().join("results.txt");
    config.errors_file = dir.path().join("errors.txt");
    config.pacing_delay = Duration::ZERO;
    config
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_item_is_retried_after_signaled_delay() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(&dir);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("notes.txt", "first\nthe needle\n")
            .failing(1, vec![SourceError::rate_limited(Duration::from_secs(3))]),
    );

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    let attempts = source.attempts_for(1);
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1] - attempts[0] >= Duration::from_secs(3));

    assert_eq!(summary.retries, 1);
    assert_eq!(summary.reports[0].attempts, 2);
    assert_eq!(summary.reports[0].status, ItemStatus::Done);
    assert_eq!(
        read(&config.results_file),
        "Found in file notes.txt, line 2\nLine: the needle\n"
    );
    assert_eq!(read(&config.errors_file), "");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connection_reset_waits_and_reconnects() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(&dir);
    config.reconnect_delay = Duration::from_secs(5);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("notes.txt", "needle\n")
            .failing(1, vec![SourceError::connection_reset("peer went away")]),
    );

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    let attempts = source.attempts_for(1);
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1] - attempts[0] >= Duration::from_secs(5));
    // Initial connect plus one reconnect
    assert_eq!(source.connects.load(Ordering::SeqCst), 2);
    assert_eq!(summary.output.total_matches, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retries_give_up_at_the_limit() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(&dir);
    config.max_retries = Some(1);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("a.txt", "needle\n")
            .with_file("b.txt", "needle\n")
            .failing(
                1,
                vec![
                    SourceError::rate_limited(Duration::from_secs(1)),
                    SourceError::rate_limited(Duration::from_secs(1)),
                ],
            ),
    );

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    assert_eq!(source.attempts_for(1).len(), 2);
    assert_eq!(summary.items_failed, 1);
    assert_eq!(summary.output.total_matches, 1);
    assert_eq!(
        read(&config.errors_file),
        "Error processing file: a.txt, error: Rate limited, retry after 1s\n"
    );
    assert_eq!(
        read(&config.results_file),
        "Found in file b.txt, line 1\nLine: needle\n"
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_terminal_error_abandons_only_that_item() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(&dir);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("a.txt", "needle\n")
            .with_file("b.txt", "needle\n")
            .failing(2, vec![SourceError::other("file reference expired")]),
    );

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    assert_eq!(source.attempts_for(2).len(), 1);
    assert_eq!(summary.items_failed, 1);
    assert_eq!(summary.retries, 0);
    assert_eq!(
        read(&config.errors_file),
        "Error processing file: b.txt, error: Source error: file reference expired\n"
    );
    assert!(read(&config.results_file).contains("Found in file a.txt, line 1"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_download_concurrency_is_bounded() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(&dir);
    config.semaphore_limit = NonZeroUsize::new(2).unwrap();
    let mut source = ScriptedSource::new().with_download_delay(Duration::from_millis(100));
    for i in 0..10 {
        source = source.with_file(&format!("file{}.txt", i), "needle\n");
    }
    let source = Arc::new(source);

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    assert!(source.peak.load(Ordering::SeqCst) <= 2);
    assert!(summary.stats.peak_in_flight >= 1);
    assert!(summary.stats.peak_in_flight <= 2);
    assert_eq!(summary.stats.in_flight, 0);
    assert_eq!(summary.items_scheduled, 10);
    assert_eq!(summary.reports.len(), 10);
    assert_eq!(summary.output.total_matches, 10);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mixed_formats_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(&dir);
    let inner = build_zip(&[("z.txt", b"hay\nhay\nhay\nNeedle deep\n")]);
    let outer = build_zip(&[("y.zip", &inner), ("readme.txt", b"nothing here\n")]);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("log.gz", gzip("alpha\nneedle in gzip\ngamma\n"))
            .with_text_message()
            .with_file("table.csv", "name,value\nfoo,NEEDLE\n")
            .with_file("x.zip", outer),
    );

    let summary = run_scan(&config, "needle", Arc::clone(&source), &SilentProgress).await?;

    assert_eq!(summary.items_scheduled, 3);
    assert_eq!(summary.output.total_matches, 3);
    let results = read(&config.results_file);
    assert!(results.contains("Found in file log.gz, line 2\nLine: needle in gzip\n"));
    assert!(results.contains("Found in file table.csv, row 2\nLine: foo NEEDLE\n"));
    assert!(results.contains(
        "Found in file z.txt, line 4\nArchive: message 4: x.zip > y.zip\nLine: Needle deep\n"
    ));
    assert_eq!(
        read(&config.errors_file),
        "No data found in archive: 4, file: readme.txt (via x.zip)\n"
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_numeric_term_skips_numeric_attachments() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(&dir);
    let source = Arc::new(
        ScriptedSource::new()
            .with_file("456", "123\n")
            .with_file("notes.txt", "order 123\n"),
    );

    let summary = run_scan(&config, "123", Arc::clone(&source), &SilentProgress).await?;

    assert_eq!(summary.items_skipped, 1);
    assert_eq!(summary.items_scheduled, 1);
    assert!(source.attempts_for(1).is_empty());
    assert_eq!(
        read(&config.results_file),
        "Found in file notes.txt, line 1\nLine: order 123\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_invalid_term_fails_before_writing() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(&dir);
    let source = Arc::new(ScriptedSource::new().with_file("a.txt", "x\n"));

    let result = run_scan(&config, "(unclosed", Arc::clone(&source), &SilentProgress).await;

    assert!(matches!(result, Err(SearchError::InvalidPattern(_))));
    assert!(source.attempts_for(1).is_empty());
    assert!(!config.results_file.exists());
    assert!(!config.errors_file.exists());
    Ok(())
}

#[tokio::test]
async fn test_directory_source_scan() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(&dir);
    let channel = dir.path().join("history").join("test-channel");
    std::fs::create_dir_all(&channel)?;
    std::fs::write(channel.join("a.txt"), "Invoice 42\nother\n")?;
    std::fs::write(channel.join("b.txt"), "unrelated\n")?;
    config.source_root = dir.path().join("history");

    let source = Arc::new(DirectorySource::new(&config.source_root));
    let summary = run_scan(&config, "invoice", source, &SilentProgress).await?;

    assert_eq!(summary.items_scheduled, 2);
    assert_eq!(
        read(&config.results_file),
        "Found in file a.txt, line 1\nLine: Invoice 42\n"
    );
    assert_eq!(read(&config.errors_file), "No data found in file: b.txt\n");
    Ok(())
}

#[tokio::test]
async fn test_unknown_channel_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(&dir);
    config.source_root = dir.path().to_path_buf();
    config.channel = "missing".to_string();

    let source = Arc::new(DirectorySource::new(&config.source_root));
    let result = run_scan(&config, "x", source, &SilentProgress).await;

    assert!(matches!(
        result,
        Err(SearchError::Source(SourceError::ChannelNotFound(_)))
    ));
    Ok(())
}
