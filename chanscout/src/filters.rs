/// Work planning: which messages become work items.
///
/// Only messages that carry an attachment are searched. On top of that, a
/// purely numeric term is never searched inside a purely numeric file name:
/// exported histories name many files by numeric id, and such pairs produce
/// noise rather than hits. The heuristic runs once, before scheduling.
use tracing::debug;

use crate::source::{Message, WorkItem};

/// True when `text` is non-empty and made of ASCII digits only
fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Checks if the attachment should be left out of the search
pub fn should_skip(search_term: &str, file_name: &str) -> bool {
    is_numeric(search_term) && is_numeric(file_name)
}

/// Work items selected from a message listing
#[derive(Debug, Default)]
pub struct WorkPlan {
    pub items: Vec<WorkItem>,
    /// Messages with an attachment that the skip rule removed
    pub skipped: usize,
}

/// Turns the channel listing into work items, in listing order
pub fn plan_work(messages: Vec<Message>, search_term: &str) -> WorkPlan {
    let mut plan = WorkPlan::default();
    for message in messages {
        let Some(attachment) = message.attachment else {
            continue;
        };
        if should_skip(search_term, &attachment.name) {
            debug!(
                "Skipping message {} with numeric attachment {}",
                message.id, attachment.name
            );
            plan.skipped += 1;
            continue;
        }
        plan.items.push(WorkItem {
            message_id: message.id,
            attachment,
        });
    }
    plan
}
