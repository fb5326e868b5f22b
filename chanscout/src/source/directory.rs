use async_trait::async_trait;
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use super::{Attachment, ChannelHandle, Message, MessageId, MessageSource, WorkItem};
use crate::errors::SourceError;

/// Serves channel histories exported to disk.
///
/// `<root>/<channel>/` holds the attachments of one channel; every file below
/// it is one message. Message ids are assigned from 1 in path order, so a
/// listing is stable between runs.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    paths: Mutex<HashMap<MessageId, PathBuf>>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Mutex::new(HashMap::new()),
        }
    }

    fn collect_files(dir: &Path) -> Vec<PathBuf> {
        WalkBuilder::new(dir)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[async_trait]
impl MessageSource for DirectorySource {
    async fn connect(&self) -> Result<(), SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::Unauthorized(format!(
                "source root {} is not a directory",
                self.root.display()
            )));
        }
        info!("Connected to exported history at {}", self.root.display());
        Ok(())
    }

    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle, SourceError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(SourceError::ChannelNotFound(name.to_string()));
        }
        Ok(ChannelHandle {
            name: name.to_string(),
            key: dir.display().to_string(),
        })
    }

    async fn list_messages(&self, channel: &ChannelHandle) -> Result<Vec<Message>, SourceError> {
        let dir = PathBuf::from(&channel.key);
        let files = tokio::task::spawn_blocking(move || Self::collect_files(&dir))
            .await
            .map_err(|e| SourceError::other(format!("listing task failed: {}", e)))?;

        let mut paths = self
            .paths
            .lock()
            .map_err(|_| SourceError::other("message index poisoned"))?;
        paths.clear();

        let mut messages = Vec::with_capacity(files.len());
        for (i, path) in files.into_iter().enumerate() {
            let id = i as MessageId + 1;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size = path.metadata().ok().map(|m| m.len());
            messages.push(Message {
                id,
                attachment: Some(Attachment { name, size }),
            });
            paths.insert(id, path);
        }

        debug!("Listed {} messages in {}", messages.len(), channel.name);
        Ok(messages)
    }

    async fn download(
        &self,
        _channel: &ChannelHandle,
        item: &WorkItem,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, SourceError> {
        let path = self
            .paths
            .lock()
            .map_err(|_| SourceError::other("message index poisoned"))?
            .get(&item.message_id)
            .cloned()
            .ok_or(SourceError::MissingAttachment(item.message_id))?;

        let mut file = tokio::fs::File::open(&path).await?;
        let written = tokio::io::copy(&mut file, dest).await?;
        Ok(written)
    }
}
