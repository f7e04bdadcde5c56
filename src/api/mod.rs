//! Purpose: Define the public HTTP surface of the Yuyu client.
//! Exports: The transport client, per-domain endpoint handles, and wire types.
//! Role: Everything that talks to the platform lives under this module.
//! Invariants: All requests flow through `ApiClient`; wrappers never build URLs themselves.

mod client;
mod comments;
mod multipart;
mod notifications;
mod users;
mod videos;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use client::{ApiClient, ApiResult, DEFAULT_TIMEOUT, UPLOAD_TIMEOUT};
pub use comments::{Comment, CommentsApi};
pub use multipart::{MultipartForm, MultipartReader, ProgressFn};
pub use notifications::NotificationsApi;
pub use users::{ClaimResponse, LoginResponse, ProfileUpdate, RegisterRequest, UsersApi};
pub use videos::{
    Author, FEED_COST, FeedResponse, Page, SortBy, UploadRequest, VideoDetail, VideoSummary,
    VideoUpdate, VideosApi,
};
