use crate::queue::QueueItem;
use tracing::error;

/// User-facing notification for mutations that could not be synced.
pub trait Notifier: Send + Sync {
    /// Called once per item dropped at the retry cap.
    fn sync_failed(&self, item: &QueueItem, reason: &str);
}

/// Logs dropped items. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn sync_failed(&self, item: &QueueItem, reason: &str) {
        error!(
            item_id = %item.id,
            entity = %item.entity_type,
            action = %item.action,
            "change could not be synced after {} attempts: {reason}",
            item.retry_count
        );
    }
}
