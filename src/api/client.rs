//! Purpose: Provide the HTTP pipeline every platform request flows through.
//! Exports: `ApiClient`, `DEFAULT_TIMEOUT`, `UPLOAD_TIMEOUT`.
//! Role: Attach the bearer credential, unwrap response envelopes, classify failures.
//! Invariants: Every failed request emits exactly one notice and rejects with a kinded error.
//! Invariants: Callers receive the envelope's `data` only; the envelope never escapes.
//! Invariants: No retries; a failure propagates to the caller after being surfaced.

use crate::api::comments::CommentsApi;
use crate::api::multipart::{MultipartForm, ProgressFn};
use crate::api::notifications::NotificationsApi;
use crate::api::users::UsersApi;
use crate::api::videos::VideosApi;
use crate::core::error::{Error, ErrorKind};
use crate::core::session::SessionStore;
use crate::notice::{Notice, NoticeSink, StderrNotices};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type ApiResult<T> = Result<T, Error>;

/// Business success sentinel inside the response envelope.
const SUCCESS_CODE: i64 = 200;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Video uploads get a much longer deadline than ordinary calls.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

const TIMEOUT_MESSAGE: &str = "request timed out, check your network connection";
const NETWORK_MESSAGE: &str = "network error, check your network connection";
const GENERIC_FAILURE_MESSAGE: &str = "request failed";

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    agent: ureq::Agent,
    session: SessionStore,
    notices: Arc<dyn NoticeSink>,
    timeout: Duration,
    upload_timeout: Duration,
}

#[derive(serde::Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(serde::Deserialize, Default)]
#[serde(default)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                agent,
                session,
                notices: Arc::new(StderrNotices),
                timeout: DEFAULT_TIMEOUT,
                upload_timeout: UPLOAD_TIMEOUT,
            }),
        })
    }

    pub fn with_notice_sink(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.rebuild(|inner| inner.notices = notices);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.rebuild(|inner| inner.timeout = timeout);
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.rebuild(|inner| inner.upload_timeout = timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.inner.notices
    }

    pub fn users(&self) -> UsersApi {
        UsersApi::new(self.clone())
    }

    pub fn videos(&self) -> VideosApi {
        VideosApi::new(self.clone())
    }

    pub fn comments(&self) -> CommentsApi {
        CommentsApi::new(self.clone())
    }

    pub fn notifications(&self) -> NotificationsApi {
        NotificationsApi::new(self.clone())
    }

    pub(crate) fn get<R>(&self, segments: &[&str], query: &[(&str, String)]) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let mut url = build_url(&self.inner.base_url, segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        let op = describe_op("GET", segments);
        let request = self.request("GET", &url, self.inner.timeout);
        self.finish(&op, request.call())
    }

    pub(crate) fn send_json<T, R>(&self, method: &str, segments: &[&str], body: &T) -> ApiResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let op = describe_op(method, segments);
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        let request = self
            .request(method, &url, self.inner.timeout)
            .set("Content-Type", "application/json");
        self.finish(&op, request.send_string(&payload))
    }

    /// POST/DELETE without a body.
    pub(crate) fn send_empty<R>(&self, method: &str, segments: &[&str]) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let op = describe_op(method, segments);
        let request = self.request(method, &url, self.inner.timeout);
        self.finish(&op, request.call())
    }

    /// Multipart POST under the upload deadline. The body streams from disk;
    /// `progress` observes bytes sent against the precomputed total.
    pub(crate) fn send_multipart<R>(
        &self,
        segments: &[&str],
        form: MultipartForm,
        progress: Option<ProgressFn>,
    ) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let op = describe_op("POST", segments);
        let content_type = form.content_type();
        let content_length = form.content_length();
        let reader = form.into_reader(progress);
        let request = self
            .request("POST", &url, self.inner.upload_timeout)
            .set("Content-Type", &content_type)
            .set("Content-Length", &content_length.to_string());
        self.finish(&op, request.send(reader))
    }

    fn request(&self, method: &str, url: &Url, timeout: Duration) -> ureq::Request {
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .timeout(timeout)
            .set("Accept", "application/json");
        if let Some(token) = self.inner.session.token() {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn finish<R>(&self, op: &str, outcome: Result<ureq::Response, ureq::Error>) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        match evaluate(outcome) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.surface(op, &err);
                Err(err)
            }
        }
    }

    fn surface(&self, op: &str, err: &Error) {
        let message = err.message().unwrap_or(GENERIC_FAILURE_MESSAGE);
        let mut notice = Notice::error(op, message);
        if let Some(code) = err.code() {
            notice = notice.with_detail("code", json!(code));
        }
        if let Some(status) = err.status() {
            notice = notice.with_detail("status", json!(status));
        }
        self.inner.notices.emit(notice);
    }

    fn rebuild(&mut self, apply: impl FnOnce(&mut ClientInner)) {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            apply(inner);
        } else {
            let mut inner = ClientInner {
                base_url: self.inner.base_url.clone(),
                agent: self.inner.agent.clone(),
                session: self.inner.session.clone(),
                notices: Arc::clone(&self.inner.notices),
                timeout: self.inner.timeout,
                upload_timeout: self.inner.upload_timeout,
            };
            apply(&mut inner);
            self.inner = Arc::new(inner);
        }
    }
}

fn evaluate<R>(outcome: Result<ureq::Response, ureq::Error>) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    match outcome {
        Ok(response) => {
            let body = response.into_string().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(GENERIC_FAILURE_MESSAGE)
                    .with_source(err)
            })?;
            parse_envelope(&body)
        }
        Err(ureq::Error::Status(status, response)) => Err(status_error(status, response)),
        Err(ureq::Error::Transport(transport)) => Err(transport_error(transport)),
    }
}

fn parse_envelope<R>(body: &str) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let envelope: Envelope = serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message(GENERIC_FAILURE_MESSAGE)
            .with_source(err)
    })?;
    if envelope.code != SUCCESS_CODE {
        let message = envelope
            .message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        return Err(Error::new(ErrorKind::Api)
            .with_code(envelope.code)
            .with_message(message));
    }
    serde_json::from_value(envelope.data).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message(GENERIC_FAILURE_MESSAGE)
            .with_source(err)
    })
}

/// Message priority for HTTP-level failures: the server's envelope message if
/// the error body carries one, otherwise a status line.
fn status_error(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with http status {status}"));
    Error::new(ErrorKind::Http)
        .with_status(status)
        .with_message(message)
}

fn transport_error(transport: ureq::Transport) -> Error {
    let text = transport
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| transport.to_string());
    let (kind, message) = classify_transport(transport.kind(), &text);
    Error::new(kind).with_message(message).with_source(transport)
}

/// Canned substitutions: timeouts and connectivity failures get fixed
/// user-facing wording; other transport failures keep their own message.
fn classify_transport(kind: ureq::ErrorKind, text: &str) -> (ErrorKind, String) {
    match kind {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
            (ErrorKind::Network, NETWORK_MESSAGE.to_string())
        }
        _ => {
            let lowered = text.to_ascii_lowercase();
            if lowered.contains("timed out") || lowered.contains("timeout") {
                (ErrorKind::Timeout, TIMEOUT_MESSAGE.to_string())
            } else if text.is_empty() {
                (ErrorKind::Network, GENERIC_FAILURE_MESSAGE.to_string())
            } else {
                (ErrorKind::Network, text.to_string())
            }
        }
    }
}

fn describe_op(method: &str, segments: &[&str]) -> String {
    format!("{method} /{}", segments.join("/"))
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("base url must use http or https scheme"));
    }
    url.set_query(None);
    url.set_fragment(None);
    if url.path().ends_with('/') && url.path() != "/" {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("base url cannot be a base"))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{
        GENERIC_FAILURE_MESSAGE, NETWORK_MESSAGE, TIMEOUT_MESSAGE, build_url, classify_transport,
        describe_op, normalize_base_url, parse_envelope,
    };
    use crate::core::error::ErrorKind;
    use serde_json::Value;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Payload {
        x: i64,
    }

    #[test]
    fn normalize_base_url_keeps_api_prefix() {
        let url = normalize_base_url("http://localhost:8081/api/".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8081/api");
    }

    #[test]
    fn normalize_base_url_rejects_other_schemes() {
        let err = normalize_base_url("ftp://localhost/api".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn build_url_appends_segments_under_the_prefix() {
        let base = normalize_base_url("http://localhost:8081/api".to_string()).expect("url");
        let url = build_url(&base, &["videos", "17", "comments"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8081/api/videos/17/comments");
    }

    #[test]
    fn build_url_works_without_a_prefix() {
        let base = normalize_base_url("http://localhost:8081".to_string()).expect("url");
        let url = build_url(&base, &["notifications"]).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8081/notifications");
    }

    #[test]
    fn envelope_success_resolves_with_data_only() {
        let payload: Payload =
            parse_envelope(r#"{"code":200,"message":"ok","data":{"x":1}}"#).expect("payload");
        assert_eq!(payload, Payload { x: 1 });
    }

    #[test]
    fn envelope_business_failure_rejects_with_message() {
        let err = parse_envelope::<Payload>(r#"{"code":40001,"message":"name taken","data":null}"#)
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.code(), Some(40001));
        assert_eq!(err.message(), Some("name taken"));
    }

    #[test]
    fn envelope_failure_without_message_uses_fallback() {
        let err = parse_envelope::<Value>(r#"{"code":500,"data":null}"#).expect_err("err");
        assert_eq!(err.message(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn non_envelope_body_is_a_decode_error() {
        let err = parse_envelope::<Value>("<html>oops</html>").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn transport_classification_uses_canned_messages() {
        let (kind, message) = classify_transport(ureq::ErrorKind::Dns, "no such host");
        assert_eq!(kind, ErrorKind::Network);
        assert_eq!(message, NETWORK_MESSAGE);

        let (kind, message) = classify_transport(ureq::ErrorKind::ConnectionFailed, "refused");
        assert_eq!(kind, ErrorKind::Network);
        assert_eq!(message, NETWORK_MESSAGE);

        let (kind, message) =
            classify_transport(ureq::ErrorKind::Io, "Error encountered: timed out reading");
        assert_eq!(kind, ErrorKind::Timeout);
        assert_eq!(message, TIMEOUT_MESSAGE);

        let (kind, message) = classify_transport(ureq::ErrorKind::Io, "connection reset by peer");
        assert_eq!(kind, ErrorKind::Network);
        assert_eq!(message, "connection reset by peer");
    }

    #[test]
    fn op_description_names_method_and_path() {
        assert_eq!(describe_op("POST", &["users", "login"]), "POST /users/login");
    }
}
