//! Purpose: Wrap the notification endpoints consumed by the poll loop.
//! Exports: `NotificationsApi`.
//! Role: Fetch the list, acknowledge one item, acknowledge everything.

use crate::api::client::{ApiClient, ApiResult};
use crate::core::notifications::Notification;

pub struct NotificationsApi {
    client: ApiClient,
}

impl NotificationsApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn list(&self) -> ApiResult<Vec<Notification>> {
        self.client.get(&["notifications"], &[])
    }

    pub fn mark_read(&self, notification_id: u64) -> ApiResult<()> {
        let _value: serde_json::Value = self.client.send_empty(
            "POST",
            &["notifications", &notification_id.to_string(), "read"],
        )?;
        Ok(())
    }

    pub fn mark_all_read(&self) -> ApiResult<()> {
        let _value: serde_json::Value = self
            .client
            .send_empty("POST", &["notifications", "read-all"])?;
        Ok(())
    }
}
