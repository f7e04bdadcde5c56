//! Purpose: Wrap the comment endpoints.
//! Exports: `CommentsApi`, `Comment`.

use crate::api::client::{ApiClient, ApiResult};
use crate::api::videos::Author;
use serde::{Deserialize, Serialize};

pub struct CommentsApi {
    client: ApiClient,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub video_id: u64,
    pub content: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize)]
struct NewComment<'a> {
    content: &'a str,
}

impl CommentsApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn list(&self, video_id: u64) -> ApiResult<Vec<Comment>> {
        self.client
            .get(&["videos", &video_id.to_string(), "comments"], &[])
    }

    pub fn post(&self, video_id: u64, content: &str) -> ApiResult<Comment> {
        self.client.send_json(
            "POST",
            &["videos", &video_id.to_string(), "comments"],
            &NewComment { content },
        )
    }

    pub fn delete(&self, comment_id: u64) -> ApiResult<()> {
        let _value: serde_json::Value = self
            .client
            .send_empty("DELETE", &["comments", &comment_id.to_string()])?;
        Ok(())
    }
}
