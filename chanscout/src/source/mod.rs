/// Boundary to the messaging platform.
///
/// The engine only needs five things from a channel history: connect, resolve
/// a channel by name, list every message, download one attachment, and
/// disconnect. Network clients implement [`MessageSource`] and report rate
/// limiting and dropped connections through [`SourceError`] so the scheduler
/// can retry them. [`DirectorySource`] serves an exported history from disk.
use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::errors::SourceError;

pub mod directory;

pub use directory::DirectorySource;

/// Platform message identifier
pub type MessageId = i64;

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Declared file name, used for format classification
    pub name: String,
    /// Size in bytes when the platform reports it
    pub size: Option<u64>,
}

/// One entry of the channel history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub attachment: Option<Attachment>,
}

/// Opaque handle to a resolved channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub name: String,
    /// Source-specific key (peer id, directory path, ...)
    pub key: String,
}

/// An attachment selected for searching; the unit of scheduling and retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub message_id: MessageId,
    pub attachment: Attachment,
}

/// Messaging platform client
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Authenticates and opens the session
    async fn connect(&self) -> Result<(), SourceError>;

    /// Resolves a channel name to a handle
    async fn resolve_channel(&self, name: &str) -> Result<ChannelHandle, SourceError>;

    /// Lists the complete history of a channel, without a limit
    async fn list_messages(&self, channel: &ChannelHandle) -> Result<Vec<Message>, SourceError>;

    /// Streams the attachment of `item` into `dest`, returning the bytes written
    async fn download(
        &self,
        channel: &ChannelHandle,
        item: &WorkItem,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, SourceError>;

    /// Closes the session
    async fn disconnect(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
