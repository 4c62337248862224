//! # HTTP List API
//!
//! [`ListApi`] over the Grocer REST backend, with push updates over a
//! WebSocket.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HttpListApi                                      │
//! │                                                                         │
//! │  fetch/create/save/categorize ──► reqwest ──► {base}/list/...?groupId  │
//! │                                      │                                  │
//! │                        Authorization: Bearer <token> (when configured) │
//! │                                                                         │
//! │  subscribe ──► connect_async ──► {ws_base}/ws/list/{id}?groupId        │
//! │                     │                                                   │
//! │                     └─► reader task ──► mpsc ──► Subscription           │
//! │                           • text frame   → Updated (bad JSON skipped)  │
//! │                           • close/error  → Error, then stream ends     │
//! │                           • unsubscribe  → close frame, task exits     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use grocer_core::{Group, Item, RemoteItem, WeekList};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::api::{ListApi, RemoteEvent, Subscription, SUBSCRIPTION_BUFFER};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{decode_push, CreateGroupRequest, CreateListRequest, SaveListRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// HTTP List API
// =============================================================================

/// REST + WebSocket client for the Grocer backend.
#[derive(Debug, Clone)]
pub struct HttpListApi {
    client: reqwest::Client,
    base_url: Url,
    ws_base_url: Url,
    auth_token: Option<String>,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl HttpListApi {
    /// Builds a client from validated configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpListApi {
            client,
            base_url: Url::parse(config.api_base_url())?,
            ws_base_url: Url::parse(&config.ws_base_url()?)?,
            auth_token: config.api.auth_token.clone(),
            request_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
        })
    }

    /// Appends path segments (percent-encoded) and the optional group query.
    fn endpoint(base: &Url, segments: &[&str], group_id: Option<&str>) -> SyncResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl(format!("{} cannot be a base URL", base)))?
            .pop_if_empty()
            .extend(segments);
        if let Some(group_id) = group_id {
            url.query_pairs_mut().append_pair("groupId", group_id);
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        group_id: Option<&str>,
    ) -> SyncResult<RequestBuilder> {
        let url = Self::endpoint(&self.base_url, segments, group_id)?;
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    /// Sends a request; non-2xx responses become [`SyncError::Http`].
    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> SyncResult<T> {
        response
            .json()
            .await
            .map_err(|e| SyncError::DeserializationFailed(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.request_timeout.as_secs())
        } else {
            SyncError::from(err)
        }
    }

    async fn connect(&self, group_id: &str, list_id: &str) -> SyncResult<WsStream> {
        let url = Self::endpoint(&self.ws_base_url, &["ws", "list", list_id], Some(group_id))?;
        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SyncError::InvalidConfig(format!("auth token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        match timeout(self.connect_timeout, connect_async(request)).await {
            Ok(Ok((stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(stream)
            }
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::Timeout(self.connect_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl ListApi for HttpListApi {
    async fn fetch_list(&self, group_id: &str, list_id: &str) -> SyncResult<Option<WeekList>> {
        let request = self.request(Method::GET, &["list", list_id], Some(group_id))?;
        match self.send(request).await {
            Ok(response) => self.json(response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_lists_for_group(&self, group_id: &str) -> SyncResult<Vec<WeekList>> {
        let request = self.request(Method::GET, &["list"], Some(group_id))?;
        let response = self.send(request).await?;
        self.json(response).await
    }

    async fn create_list(
        &self,
        group_id: &str,
        week_start: DateTime<Utc>,
    ) -> SyncResult<WeekList> {
        let request = self
            .request(Method::POST, &["list"], Some(group_id))?
            .json(&CreateListRequest::new(week_start));
        let response = self.send(request).await?;
        self.json(response).await
    }

    async fn save_list(&self, group_id: &str, list_id: &str, items: Vec<Item>) -> SyncResult<()> {
        let request = self
            .request(Method::POST, &["list", list_id], Some(group_id))?
            .json(&SaveListRequest { items });
        self.send(request).await?;
        Ok(())
    }

    async fn subscribe(&self, group_id: &str, list_id: &str) -> SyncResult<Subscription> {
        let stream = self.connect(group_id, list_id).await?;
        info!(group_id = %group_id, list_id = %list_id, "Subscribed to list updates");

        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(pump_updates(stream, events_tx, stop_rx, list_id.to_string()));

        Ok(Subscription::new(events_rx, move || {
            let _ = stop_tx.send(());
        }))
    }

    async fn categorize(&self, group_id: &str, list_id: &str) -> SyncResult<Vec<RemoteItem>> {
        let request = self.request(Method::POST, &["list", "categorize", list_id], Some(group_id))?;
        let response = self.send(request).await.map_err(|e| match e {
            SyncError::Http { message, .. } if !message.is_empty() => SyncError::Categorize(message),
            other => other,
        })?;
        self.json(response).await
    }

    async fn fetch_groups(&self) -> SyncResult<Vec<Group>> {
        let request = self.request(Method::GET, &["group"], None)?;
        let response = self.send(request).await?;
        self.json(response).await
    }

    async fn create_group(&self, name: &str) -> SyncResult<Group> {
        let request = self
            .request(Method::POST, &["group"], None)?
            .json(&CreateGroupRequest {
                name: name.to_string(),
            });
        let response = self.send(request).await?;
        self.json(response).await
    }
}

// =============================================================================
// Push Reader
// =============================================================================

/// Forwards decoded push frames until the socket ends or the subscription
/// is torn down.
async fn pump_updates(
    stream: WsStream,
    events: mpsc::Sender<RemoteEvent>,
    mut stop: oneshot::Receiver<()>,
    list_id: String,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!(list_id = %list_id, "Unsubscribing from list updates");
                let _ = write.send(WsMessage::Close(None)).await;
                break;
            }

            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match decode_push(&text) {
                    Ok(update) => {
                        if events.send(RemoteEvent::Updated(update)).await.is_err() {
                            debug!(list_id = %list_id, "Subscription dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(list_id = %list_id, error = %e, "Skipping unparseable push frame");
                    }
                },
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = write.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(list_id = %list_id, ?frame, "List update stream closed by server");
                    let _ = events.send(RemoteEvent::Error(SyncError::Disconnected.to_string())).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = SyncError::from(e);
                    error!(list_id = %list_id, error = %err, "List update stream failed");
                    let _ = events.send(RemoteEvent::Error(err.to_string())).await;
                    break;
                }
                None => {
                    let _ = events.send(RemoteEvent::Error(SyncError::Disconnected.to_string())).await;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> HttpListApi {
        let mut config = SyncConfig::default();
        config.api.base_url = base_url.into();
        config.api.auth_token = Some("secret".into());
        HttpListApi::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments_and_group() {
        let api = api("https://grocer.example.com/api/");
        let url = HttpListApi::endpoint(&api.base_url, &["list", "a b/c"], Some("g&1")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://grocer.example.com/api/list/a%20b%2Fc?groupId=g%261"
        );

        let url = HttpListApi::endpoint(&api.base_url, &["group"], None).unwrap();
        assert_eq!(url.as_str(), "https://grocer.example.com/api/group");
    }

    #[test]
    fn test_ws_endpoint() {
        let api = api("https://grocer.example.com/api");
        let url =
            HttpListApi::endpoint(&api.ws_base_url, &["ws", "list", "L1"], Some("G")).unwrap();
        assert_eq!(url.as_str(), "wss://grocer.example.com/api/ws/list/L1?groupId=G");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SyncConfig::default();
        config.api.base_url = "ftp://example.com".into();
        assert!(HttpListApi::new(&config).unwrap_err().is_config_error());
    }
}
