//! Group notifications: short broadcast messages, listed newest first.

use tracing::info;

use tutti_shared::constants::MAX_NOTIFICATION_LEN;
use tutti_shared::ordering::sort_notifications;
use tutti_shared::paths;
use tutti_shared::Notification;

use crate::error::{Result, StoreError};
use crate::store::{checked_id, Store};
use crate::stream::TypedStream;

impl Store {
    /// Group notifications, newest first.
    pub fn watch_notifications(&self) -> TypedStream<Vec<Notification>> {
        self.watch_collection(paths::notifications(self.group_id()))
            .map_each(sort_notifications)
    }

    /// Broadcast a notification to the group. Returns its id.
    pub async fn post_notification(&self, text: &str) -> Result<String> {
        self.require_account()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::Validation("notification text is required".into()));
        }
        let len = text.chars().count();
        if len > MAX_NOTIFICATION_LEN {
            return Err(StoreError::Validation(format!(
                "notification is {len} characters (max {MAX_NOTIFICATION_LEN})"
            )));
        }

        let group = self.group_id();
        let id = self.backend().push(&paths::notifications(group)).await?;
        let notification = Notification {
            id: id.clone(),
            text: text.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.write(&paths::notification(group, &id), &notification)
            .await?;

        info!(notification_id = %id, "Notification posted");
        Ok(id)
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<()> {
        self.require_account()?;
        let notification_id = checked_id("notification", notification_id)?;
        self.backend()
            .remove(&paths::notification(self.group_id(), notification_id))
            .await?;
        Ok(())
    }
}
