//! REST collaborator client.
//!
//! Every call takes the session credential explicitly; nothing is read from
//! ambient state. Failures are mapped to [`ClientError`] with the backend's
//! `detail` message when it sent one.

use std::time::Duration;

use client_core::{ClientError, ClientErrorCategory, Credential, MessageId, RoomId, UserId};
use reqwest::{Method, RequestBuilder, Response, header::RETRY_AFTER};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token returned by login and signup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl AuthToken {
    pub fn credential(&self) -> Credential {
        Credential::new(self.access_token.clone())
    }
}

/// Account profile as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_username_change: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Entry of the caller's block list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BlockedUser {
    pub blocked_id: UserId,
    #[serde(default)]
    pub blocked_user: Option<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Direct conversation flags; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ConversationPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                ClientError::new(
                    ClientErrorCategory::Internal,
                    "http_client_build_failed",
                    err.to_string(),
                )
            })?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Auth

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.call(Method::POST, "/auth/login", None, Some(body))
            .await
    }

    pub async fn signup(
        &self,
        username: &str,
        nickname: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthToken, ClientError> {
        let body = json!({
            "username": username,
            "nickname": nickname,
            "email": email,
            "password": password,
        });
        self.call(Method::POST, "/auth/signup", None, Some(body))
            .await
    }

    pub async fn me(&self, credential: &Credential) -> Result<User, ClientError> {
        self.call(Method::GET, "/auth/me", Some(credential), None)
            .await
    }

    pub async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<User, ClientError> {
        let body = to_body(update)?;
        self.call(Method::PATCH, "/users/me", Some(credential), Some(body))
            .await
    }

    // Direct messages

    pub async fn list_dms(&self, credential: &Credential) -> Result<Vec<Value>, ClientError> {
        self.call_list("/dms", credential).await
    }

    /// History rows of the direct conversation with `peer_id`.
    pub async fn dm_history(
        &self,
        credential: &Credential,
        peer_id: UserId,
    ) -> Result<Vec<Value>, ClientError> {
        self.call_list(&format!("/dms/{peer_id}"), credential).await
    }

    pub async fn edit_dm_message(
        &self,
        credential: &Credential,
        id: MessageId,
        content: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/dms/messages/{id}"),
            Some(credential),
            Some(json!({ "content": content })),
        )
        .await
    }

    pub async fn delete_dm_message(
        &self,
        credential: &Credential,
        id: MessageId,
        for_me_only: bool,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::DELETE,
            &format!("/dms/messages/{id}?for_me_only={for_me_only}"),
            credential,
            None,
        )
        .await
    }

    pub async fn react_dm_message(
        &self,
        credential: &Credential,
        id: MessageId,
        emoji: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/dms/messages/{id}/react"),
            Some(credential),
            Some(json!({ "emoji": emoji })),
        )
        .await
    }

    pub async fn pin_dm_message(
        &self,
        credential: &Credential,
        id: MessageId,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/dms/messages/{id}/pin"),
            Some(credential),
            None,
        )
        .await
    }

    pub async fn forward_dm_message(
        &self,
        credential: &Credential,
        id: MessageId,
        to_user_id: UserId,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::POST,
            &format!("/dms/messages/{id}/forward"),
            credential,
            Some(json!({ "to_user_id": to_user_id })),
        )
        .await
    }

    /// Mute or archive the direct conversation with `peer_id`.
    pub async fn set_dm_preferences(
        &self,
        credential: &Credential,
        peer_id: UserId,
        preferences: &ConversationPreferences,
    ) -> Result<(), ClientError> {
        let body = to_body(preferences)?;
        self.call_unit(
            Method::PATCH,
            &format!("/dms/conversations/{peer_id}/preferences"),
            credential,
            Some(body),
        )
        .await
    }

    pub async fn clear_dm_conversation(
        &self,
        credential: &Credential,
        peer_id: UserId,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::POST,
            &format!("/dms/conversations/{peer_id}/clear"),
            credential,
            None,
        )
        .await
    }

    // Users

    pub async fn get_user(&self, credential: &Credential, id: UserId) -> Result<User, ClientError> {
        self.call(Method::GET, &format!("/users/{id}"), Some(credential), None)
            .await
    }

    pub async fn search_users(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<User>, ClientError> {
        let path = format!("/users/search?q={}", urlencoding::encode(query));
        self.call(Method::GET, &path, Some(credential), None).await
    }

    pub async fn block_user(&self, credential: &Credential, id: UserId) -> Result<(), ClientError> {
        self.call_unit(Method::POST, &format!("/users/block/{id}"), credential, None)
            .await
    }

    pub async fn unblock_user(
        &self,
        credential: &Credential,
        id: UserId,
    ) -> Result<(), ClientError> {
        self.call_unit(Method::DELETE, &format!("/users/block/{id}"), credential, None)
            .await
    }

    pub async fn blocked_users(
        &self,
        credential: &Credential,
    ) -> Result<Vec<BlockedUser>, ClientError> {
        let rows = self.call_list("/users/blocked", credential).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(row)
                    .inspect_err(|err| warn!(error = %err, "skipping malformed block entry"))
                    .ok()
            })
            .collect())
    }

    // Rooms

    pub async fn list_rooms(&self, credential: &Credential) -> Result<Vec<Value>, ClientError> {
        self.call_list("/rooms", credential).await
    }

    pub async fn create_room(
        &self,
        credential: &Credential,
        name: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::POST,
            "/rooms",
            Some(credential),
            Some(json!({ "name": name })),
        )
        .await
    }

    pub async fn get_room(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<Value, ClientError> {
        self.call(Method::GET, &room_path(room_id, ""), Some(credential), None)
            .await
    }

    pub async fn room_history(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<Vec<Value>, ClientError> {
        self.call_list(&room_path(room_id, "/messages"), credential)
            .await
    }

    /// Ids of the room members currently online.
    pub async fn room_online(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<Vec<UserId>, ClientError> {
        let value: Value = self
            .call(Method::GET, &room_path(room_id, "/online"), Some(credential), None)
            .await?;
        Ok(online_user_ids(&value))
    }

    pub async fn join_room(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<(), ClientError> {
        self.call_unit(Method::POST, &room_path(room_id, "/join"), credential, None)
            .await
    }

    pub async fn leave_room(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<(), ClientError> {
        self.call_unit(Method::DELETE, &room_path(room_id, "/leave"), credential, None)
            .await
    }

    pub async fn end_room(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<(), ClientError> {
        self.call_unit(Method::POST, &room_path(room_id, "/end"), credential, None)
            .await
    }

    pub async fn delete_room(
        &self,
        credential: &Credential,
        room_id: &RoomId,
    ) -> Result<(), ClientError> {
        self.call_unit(Method::DELETE, &room_path(room_id, ""), credential, None)
            .await
    }

    pub async fn add_room_member(
        &self,
        credential: &Credential,
        room_id: &RoomId,
        username: &str,
    ) -> Result<(), ClientError> {
        let username = username.trim().to_lowercase();
        let suffix = format!("/members/by-username/{}", urlencoding::encode(&username));
        self.call_unit(Method::POST, &room_path(room_id, &suffix), credential, None)
            .await
    }

    pub async fn remove_room_member(
        &self,
        credential: &Credential,
        room_id: &RoomId,
        user_id: UserId,
    ) -> Result<(), ClientError> {
        let suffix = format!("/members/{user_id}");
        self.call_unit(Method::DELETE, &room_path(room_id, &suffix), credential, None)
            .await
    }

    pub async fn edit_room_message(
        &self,
        credential: &Credential,
        id: MessageId,
        content: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/rooms/messages/{id}"),
            Some(credential),
            Some(json!({ "content": content })),
        )
        .await
    }

    pub async fn delete_room_message(
        &self,
        credential: &Credential,
        id: MessageId,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::DELETE,
            &format!("/rooms/messages/{id}"),
            credential,
            None,
        )
        .await
    }

    pub async fn react_room_message(
        &self,
        credential: &Credential,
        id: MessageId,
        emoji: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/rooms/messages/{id}/react"),
            Some(credential),
            Some(json!({ "emoji": emoji })),
        )
        .await
    }

    pub async fn pin_room_message(
        &self,
        credential: &Credential,
        id: MessageId,
    ) -> Result<Value, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/rooms/messages/{id}/pin"),
            Some(credential),
            None,
        )
        .await
    }

    pub async fn forward_room_message(
        &self,
        credential: &Credential,
        id: MessageId,
        to_room_id: &RoomId,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::POST,
            &format!("/rooms/messages/{id}/forward"),
            credential,
            Some(json!({ "to_room_id": to_room_id })),
        )
        .await
    }

    // Friends

    pub async fn friend_requests(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Value>, ClientError> {
        self.call_list("/friends/requests", credential).await
    }

    /// Usernames are matched case-insensitively by the backend.
    pub async fn send_friend_request(
        &self,
        credential: &Credential,
        username: &str,
    ) -> Result<(), ClientError> {
        let username = username.trim().to_lowercase();
        self.call_unit(
            Method::POST,
            "/friends/requests",
            credential,
            Some(json!({ "username": username })),
        )
        .await
    }

    pub async fn accept_friend_request(
        &self,
        credential: &Credential,
        request_id: i64,
    ) -> Result<(), ClientError> {
        self.call_unit(
            Method::POST,
            &format!("/friends/requests/{request_id}/accept"),
            credential,
            None,
        )
        .await
    }

    pub async fn friends(&self, credential: &Credential) -> Result<Vec<Value>, ClientError> {
        self.call_list("/friends/all", credential).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> RequestBuilder {
        let mut request = self.http.request(method, self.url(path));
        if let Some(credential) = credential {
            request = request.bearer_auth(credential.expose());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        debug!(%method, path, "rest request");
        let response = self
            .request(method, path, credential, body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        parse_response(response).await
    }

    async fn call_unit(
        &self,
        method: Method,
        path: &str,
        credential: &Credential,
        body: Option<Value>,
    ) -> Result<(), ClientError> {
        self.call::<Value>(method, path, Some(credential), body)
            .await
            .map(|_| ())
    }

    /// GET a collection. A non-array body is treated as empty.
    async fn call_list(
        &self,
        path: &str,
        credential: &Credential,
    ) -> Result<Vec<Value>, ClientError> {
        let value: Value = self.call(Method::GET, path, Some(credential), None).await?;
        Ok(match value {
            Value::Array(rows) => rows,
            other => {
                debug!(path, kind = ?other, "expected a list response");
                Vec::new()
            }
        })
    }
}

fn room_path(room_id: &RoomId, suffix: &str) -> String {
    format!("/rooms/{}{suffix}", urlencoding::encode(room_id))
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|err| {
        ClientError::new(
            ClientErrorCategory::Serialization,
            "request_body_encode_failed",
            err.to_string(),
        )
    })
}

fn online_user_ids(value: &Value) -> Vec<UserId> {
    value
        .get("online_user_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.bytes().await.map_err(map_reqwest_error)?;

    if !status.is_success() {
        let err = error_from_status(status.as_u16(), retry_after, &body);
        warn!(
            status = status.as_u16(),
            code = %err.code,
            message = %err.message,
            "rest request failed"
        );
        return Err(err);
    }

    let body: &[u8] = if body.is_empty() { b"null" } else { &body };
    serde_json::from_slice(body).map_err(|err| {
        ClientError::new(
            ClientErrorCategory::Serialization,
            "invalid_response_body",
            err.to_string(),
        )
    })
}

fn error_from_status(status: u16, retry_after: Option<Duration>, body: &[u8]) -> ClientError {
    let message =
        detail_message(body).unwrap_or_else(|| format!("request failed with status {status}"));
    let err = ClientError::from_status(status, message);
    match retry_after {
        Some(delay) => err.with_retry_after(delay),
        None => err,
    }
}

/// Human-readable `detail` from an error body, either a string or a list of
/// validation entries carrying `msg`.
fn detail_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::new(
            ClientErrorCategory::Network,
            "request_timeout",
            err.to_string(),
        )
    } else if err.is_decode() {
        ClientError::new(
            ClientErrorCategory::Serialization,
            "invalid_response_body",
            err.to_string(),
        )
    } else if let Some(status) = err.status() {
        ClientError::from_status(status.as_u16(), err.to_string())
    } else {
        ClientError::new(
            ClientErrorCategory::Network,
            "request_failed",
            err.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = RestClient::new(" http://api.local:8000/ ").expect("client should build");
        assert_eq!(client.base_url(), "http://api.local:8000");
        assert_eq!(client.url("/auth/me"), "http://api.local:8000/auth/me");
    }

    #[test]
    fn room_paths_encode_ids() {
        assert_eq!(room_path(&"general".to_owned(), ""), "/rooms/general");
        assert_eq!(
            room_path(&"a b/c".to_owned(), "/messages"),
            "/rooms/a%20b%2Fc/messages"
        );
    }

    #[test]
    fn error_uses_detail_and_status_class() {
        let err = error_from_status(403, None, br#"{"detail":"You are blocked"}"#);
        assert_eq!(err.category, ClientErrorCategory::Auth);
        assert_eq!(err.code, "http_403");
        assert_eq!(err.message, "You are blocked");

        let err = error_from_status(
            422,
            None,
            br#"{"detail":[{"msg":"field required"},{"msg":"too short"}]}"#,
        );
        assert_eq!(err.category, ClientErrorCategory::Request);
        assert_eq!(err.message, "field required; too short");

        let err = error_from_status(502, None, b"<html>bad gateway</html>");
        assert_eq!(err.category, ClientErrorCategory::Network);
        assert_eq!(err.message, "request failed with status 502");
    }

    #[test]
    fn rate_limit_keeps_retry_hint() {
        let err = error_from_status(429, Some(Duration::from_secs(3)), b"{}");
        assert_eq!(err.category, ClientErrorCategory::RateLimited);
        assert_eq!(err.retry_after_ms, Some(3000));
        assert!(err.is_recoverable());
    }

    #[test]
    fn online_ids_are_lenient() {
        assert_eq!(
            online_user_ids(&json!({"online_user_ids": [1, "x", 3]})),
            vec![1, 3]
        );
        assert!(online_user_ids(&json!(null)).is_empty());
    }

    #[test]
    fn profile_update_omits_unset_fields() {
        let body = to_body(&ProfileUpdate {
            nickname: Some("Nova".to_owned()),
            username: None,
        })
        .expect("encode");
        assert_eq!(body, json!({"nickname": "Nova"}));
    }

    /// One request as seen by the test server.
    #[derive(Debug)]
    struct Captured {
        /// Request line and headers as sent.
        head: String,
        body: Option<Value>,
    }

    impl Captured {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }
    }

    fn content_length(head: &str) -> usize {
        head.to_lowercase()
            .lines()
            .find_map(|line| line.strip_prefix("content-length:").map(str::to_owned))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Serves one canned HTTP response and reports the request it answered.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should work");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let (captured_tx, captured_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept should work");
            let mut buf = Vec::new();
            let mut chunk = [0_u8; 1024];
            let head_end = loop {
                if let Some(at) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
                    break at + 4;
                }
                let read = stream.read(&mut chunk).await.expect("read should work");
                if read == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..read]);
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
            let wanted = head_end + content_length(&head);
            while buf.len() < wanted {
                let read = stream.read(&mut chunk).await.expect("read should work");
                if read == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..read]);
            }
            let request_body = serde_json::from_slice(&buf[head_end..]).ok();
            let _ = captured_tx.send(Captured {
                head,
                body: request_body,
            });

            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .await
                .expect("write should work");
            let _ = stream.shutdown().await;
        });

        (base, captured_rx)
    }

    fn credential() -> Credential {
        Credential::new("jwt-123")
    }

    #[tokio::test]
    async fn sends_bearer_credential_and_parses_user() {
        let (base, head) = serve_once(
            "200 OK",
            r#"{"id":7,"username":"nova","nickname":"Nova","email":"n@example.org"}"#,
        )
        .await;
        let client = RestClient::new(&base).expect("client should build");

        let user = client
            .me(&Credential::new("jwt-123"))
            .await
            .expect("me should work");
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "nova");

        let request = head.await.expect("request should be captured");
        assert_eq!(request.request_line(), "GET /auth/me HTTP/1.1");
        assert!(
            request.head.to_lowercase().contains("authorization: bearer jwt-123"),
            "head: {}",
            request.head
        );
        assert_eq!(request.body, None);
    }

    #[tokio::test]
    async fn failure_maps_detail_into_client_error() {
        let (base, _head) = serve_once("404 Not Found", r#"{"detail":"Room not found"}"#).await;
        let client = RestClient::new(&base).expect("client should build");

        let err = client
            .room_history(&Credential::new("t"), &"missing".to_owned())
            .await
            .expect_err("404 should fail");
        assert_eq!(err.category, ClientErrorCategory::Request);
        assert_eq!(err.code, "http_404");
        assert_eq!(err.message, "Room not found");
    }

    #[tokio::test]
    async fn non_list_history_is_empty() {
        let (base, _head) = serve_once("200 OK", r#"{"unexpected":true}"#).await;
        let client = RestClient::new(&base).expect("client should build");
        let rows = client
            .dm_history(&Credential::new("t"), 3)
            .await
            .expect("history should load");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        drop(listener);

        let client = RestClient::new(&base).expect("client should build");
        let err = client
            .login("a@b.c", "pw")
            .await
            .expect_err("closed port should fail");
        assert_eq!(err.category, ClientErrorCategory::Network);
    }

    async fn answering(body: &'static str) -> (RestClient, oneshot::Receiver<Captured>) {
        let (base, captured) = serve_once("200 OK", body).await;
        (RestClient::new(&base).expect("client should build"), captured)
    }

    #[tokio::test]
    async fn dm_delete_carries_for_me_only_flag() {
        let (client, captured) = answering("{}").await;
        client
            .delete_dm_message(&credential(), 42, true)
            .await
            .expect("delete for me should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "DELETE /dms/messages/42?for_me_only=true HTTP/1.1"
        );

        let (client, captured) = answering("{}").await;
        client
            .delete_dm_message(&credential(), 42, false)
            .await
            .expect("delete for everyone should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "DELETE /dms/messages/42?for_me_only=false HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn room_member_is_added_by_lowercased_encoded_username() {
        let (client, captured) = answering("{}").await;
        client
            .add_room_member(&credential(), &"team a".to_owned(), "  Nova Star ")
            .await
            .expect("add member should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "POST /rooms/team%20a/members/by-username/nova%20star HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn friend_request_lowercases_username() {
        let (client, captured) = answering("{}").await;
        client
            .send_friend_request(&credential(), " NoVa ")
            .await
            .expect("friend request should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /friends/requests HTTP/1.1");
        assert_eq!(request.body, Some(json!({"username": "nova"})));
    }

    #[tokio::test]
    async fn signup_posts_account_without_credential() {
        let (client, captured) =
            answering(r#"{"access_token":"tok","token_type":"bearer"}"#).await;
        let token = client
            .signup("nova", "Nova", "n@example.org", "secret")
            .await
            .expect("signup should work");
        assert_eq!(token.credential(), Credential::new("tok"));

        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /auth/signup HTTP/1.1");
        assert!(!request.head.to_lowercase().contains("authorization:"));
        assert_eq!(
            request.body,
            Some(json!({
                "username": "nova",
                "nickname": "Nova",
                "email": "n@example.org",
                "password": "secret",
            }))
        );
    }

    #[tokio::test]
    async fn profile_update_patches_set_fields_only() {
        let (client, captured) = answering(r#"{"id":7,"nickname":"Nova"}"#).await;
        let user = client
            .update_profile(
                &credential(),
                &ProfileUpdate {
                    nickname: Some("Nova".to_owned()),
                    username: None,
                },
            )
            .await
            .expect("profile update should work");
        assert_eq!(user.nickname, "Nova");

        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "PATCH /users/me HTTP/1.1");
        assert_eq!(request.body, Some(json!({"nickname": "Nova"})));
    }

    #[tokio::test]
    async fn dm_preferences_send_changed_flags_only() {
        let (client, captured) = answering("{}").await;
        client
            .set_dm_preferences(
                &credential(),
                5,
                &ConversationPreferences {
                    is_muted: Some(true),
                    is_archived: None,
                },
            )
            .await
            .expect("preferences should save");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "PATCH /dms/conversations/5/preferences HTTP/1.1"
        );
        assert_eq!(request.body, Some(json!({"is_muted": true})));
    }

    #[tokio::test]
    async fn dm_listing_and_forwarding() {
        let (client, captured) = answering(r#"[{"user_id":3},{"user_id":4}]"#).await;
        let rows = client
            .list_dms(&credential())
            .await
            .expect("dm list should load");
        assert_eq!(rows.len(), 2);
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "GET /dms HTTP/1.1");

        let (client, captured) = answering("{}").await;
        client
            .forward_dm_message(&credential(), 11, 3)
            .await
            .expect("forward should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /dms/messages/11/forward HTTP/1.1");
        assert_eq!(request.body, Some(json!({"to_user_id": 3})));
    }

    #[tokio::test]
    async fn block_list_keeps_well_formed_entries() {
        let (client, captured) = answering(
            r#"[{"id":1,"blocked_id":9,"blocked_user":{"id":9,"username":"spam"}},{"id":2}]"#,
        )
        .await;
        let blocked = client
            .blocked_users(&credential())
            .await
            .expect("block list should load");
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].blocked_id, 9);
        assert_eq!(
            blocked[0].blocked_user.as_ref().map(|user| user.username.as_str()),
            Some("spam")
        );
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "GET /users/blocked HTTP/1.1");
    }

    #[tokio::test]
    async fn block_and_unblock_target_the_user() {
        let (client, captured) = answering("{}").await;
        client
            .block_user(&credential(), 9)
            .await
            .expect("block should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /users/block/9 HTTP/1.1");

        let (client, captured) = answering("{}").await;
        client
            .unblock_user(&credential(), 9)
            .await
            .expect("unblock should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "DELETE /users/block/9 HTTP/1.1");
    }

    #[tokio::test]
    async fn user_search_encodes_query() {
        let (client, captured) = answering(r#"[{"id":2,"username":"nova star"}]"#).await;
        let users = client
            .search_users(&credential(), "nova star")
            .await
            .expect("search should work");
        assert_eq!(users.len(), 1);
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "GET /users/search?q=nova%20star HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn rooms_are_listed_and_created() {
        let (client, captured) = answering(r#"[{"id":"general"}]"#).await;
        let rooms = client
            .list_rooms(&credential())
            .await
            .expect("room list should load");
        assert_eq!(rooms, vec![json!({"id": "general"})]);
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "GET /rooms HTTP/1.1");

        let (client, captured) = answering(r#"{"id":"general","name":"General"}"#).await;
        let room = client
            .create_room(&credential(), "General")
            .await
            .expect("room should be created");
        assert_eq!(room["id"], "general");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /rooms HTTP/1.1");
        assert_eq!(request.body, Some(json!({"name": "General"})));
    }

    #[tokio::test]
    async fn room_lifecycle_calls_hit_their_endpoints() {
        let room = "team a".to_owned();

        let (client, captured) = answering("{}").await;
        client
            .leave_room(&credential(), &room)
            .await
            .expect("leave should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "DELETE /rooms/team%20a/leave HTTP/1.1");

        let (client, captured) = answering("{}").await;
        client
            .end_room(&credential(), &room)
            .await
            .expect("end should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "POST /rooms/team%20a/end HTTP/1.1");

        let (client, captured) = answering("{}").await;
        client
            .delete_room(&credential(), &room)
            .await
            .expect("delete should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "DELETE /rooms/team%20a HTTP/1.1");

        let (client, captured) = answering("{}").await;
        client
            .remove_room_member(&credential(), &room, 8)
            .await
            .expect("remove member should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "DELETE /rooms/team%20a/members/8 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn friend_requests_are_accepted_by_id() {
        let (client, captured) = answering("{}").await;
        client
            .accept_friend_request(&credential(), 4)
            .await
            .expect("accept should work");
        let request = captured.await.expect("request should be captured");
        assert_eq!(
            request.request_line(),
            "POST /friends/requests/4/accept HTTP/1.1"
        );

        let (client, captured) = answering(r#"[{"id":2}]"#).await;
        let friends = client
            .friends(&credential())
            .await
            .expect("friends should load");
        assert_eq!(friends.len(), 1);
        let request = captured.await.expect("request should be captured");
        assert_eq!(request.request_line(), "GET /friends/all HTTP/1.1");
    }
}
