//! Purpose: Wrap the video endpoints: browse, search, upload, edit, reward.
//! Exports: `VideosApi`, `VideoSummary`, `VideoDetail`, `Author`, `Page`, `SortBy`,
//! `UploadRequest`, `VideoUpdate`, `FeedResponse`, `FEED_COST`.
//! Role: Typed surface over `/videos`; uploads stream multipart with progress.
//! Invariants: Upload runs under the extended deadline; everything else uses the default.

use crate::api::client::{ApiClient, ApiResult};
use crate::api::multipart::{MultipartForm, ProgressFn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fish coins deducted from the sender by one feed (reward) action.
pub const FEED_COST: u64 = 1;

pub struct VideosApi {
    client: ApiClient,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortBy {
    Latest,
    Views,
    Popularity,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Latest => "latest",
            SortBy::Views => "views",
            SortBy::Popularity => "popularity",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub fish_count: u64,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub fish_count: u64,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub title: String,
    pub description: String,
    pub file: PathBuf,
    pub cover: PathBuf,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    /// The video's fish count after the reward landed.
    #[serde(default)]
    pub fish_count: u64,
}

impl VideosApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn list(&self, page: u32, size: u32, sort_by: SortBy) -> ApiResult<Page<VideoSummary>> {
        self.client.get(
            &["videos"],
            &[
                ("page", page.to_string()),
                ("size", size.to_string()),
                ("sortBy", sort_by.as_str().to_string()),
            ],
        )
    }

    pub fn detail(&self, video_id: u64) -> ApiResult<VideoDetail> {
        self.client.get(&["videos", &video_id.to_string()], &[])
    }

    pub fn search(&self, query: &str, page: u32, size: u32) -> ApiResult<Page<VideoSummary>> {
        self.client.get(
            &["videos", "search"],
            &[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("size", size.to_string()),
            ],
        )
    }

    /// Uploads a video with its cover image. Runs under the 5-minute upload
    /// deadline; `progress` observes bytes sent against the body total.
    pub fn upload(
        &self,
        request: &UploadRequest,
        progress: Option<ProgressFn>,
    ) -> ApiResult<VideoDetail> {
        let form = MultipartForm::new()?
            .text("title", &request.title)
            .text("description", &request.description)
            .file("file", &request.file)?
            .file("cover", &request.cover)?;
        self.client
            .send_multipart(&["videos", "upload"], form, progress)
    }

    pub fn update(&self, video_id: u64, update: &VideoUpdate) -> ApiResult<VideoDetail> {
        self.client
            .send_json("PATCH", &["videos", &video_id.to_string()], update)
    }

    pub fn delete(&self, video_id: u64) -> ApiResult<()> {
        let _value: serde_json::Value = self
            .client
            .send_empty("DELETE", &["videos", &video_id.to_string()])?;
        Ok(())
    }

    /// Feeds a fish to the video (the reward mechanic). The caller records
    /// the spend against the session only after this succeeds.
    pub fn feed(&self, video_id: u64) -> ApiResult<FeedResponse> {
        self.client
            .send_empty("POST", &["videos", &video_id.to_string(), "feed"])
    }
}
