//! Purpose: Wrap the user and account endpoints.
//! Exports: `UsersApi` and its request/response types.
//! Role: Registration, login, own-profile management, public profiles, search.
//! Invariants: `login` returns the credential; storing it is the session store's job.

use crate::api::client::{ApiClient, ApiResult};
use crate::api::multipart::{MultipartForm, ProgressFn};
use crate::api::videos::{Page, VideoSummary};
use crate::core::session::Profile;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub struct UsersApi {
    client: ApiClient,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub verification_code: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<Profile>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct VerificationRequest<'a> {
    email: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    /// Balance after the daily reward landed.
    pub new_balance: u64,
}

impl UsersApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn register(&self, request: &RegisterRequest) -> ApiResult<Profile> {
        self.client
            .send_json("POST", &["users", "register"], request)
    }

    pub fn login(&self, username: &str, password: &str) -> ApiResult<LoginResponse> {
        self.client.send_json(
            "POST",
            &["users", "login"],
            &LoginRequest { username, password },
        )
    }

    pub fn me(&self) -> ApiResult<Profile> {
        self.client.get(&["users", "me"], &[])
    }

    pub fn update_me(&self, update: &ProfileUpdate) -> ApiResult<Profile> {
        self.client.send_json("PATCH", &["users", "me"], update)
    }

    pub fn claim_daily(&self) -> ApiResult<ClaimResponse> {
        self.client
            .send_empty("POST", &["users", "me", "claim-daily"])
    }

    pub fn update_avatar(
        &self,
        image: impl AsRef<Path>,
        progress: Option<ProgressFn>,
    ) -> ApiResult<Profile> {
        let form = MultipartForm::new()?.file("avatar", image.as_ref())?;
        self.client
            .send_multipart(&["users", "me", "avatar"], form, progress)
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> ApiResult<()> {
        let _value: serde_json::Value = self.client.send_json(
            "POST",
            &["users", "me", "password"],
            &PasswordChange {
                old_password,
                new_password,
            },
        )?;
        Ok(())
    }

    pub fn profile(&self, username: &str) -> ApiResult<Profile> {
        self.client.get(&["users", username], &[])
    }

    pub fn videos(&self, user_id: u64, page: u32, size: u32) -> ApiResult<Page<VideoSummary>> {
        self.client.get(
            &["users", &user_id.to_string(), "videos"],
            &[("page", page.to_string()), ("size", size.to_string())],
        )
    }

    pub fn search(&self, query: &str, page: u32, size: u32) -> ApiResult<Page<Profile>> {
        self.client.get(
            &["users", "search"],
            &[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("size", size.to_string()),
            ],
        )
    }

    pub fn send_verification_code(&self, email: &str) -> ApiResult<()> {
        let _value: serde_json::Value = self.client.send_json(
            "POST",
            &["users", "send-verification-code"],
            &VerificationRequest { email },
        )?;
        Ok(())
    }
}
