//! Twitch EventSub client over WebSocket.
//!
//! Start-up sequence:
//!
//! 1. Load the token record and exchange its refresh token for a fresh
//!    pair, writing the new pair back to disk.
//! 2. Resolve the configured login to a broadcaster id (Helix `users`).
//! 3. Open the EventSub socket and wait for `session_welcome`.
//! 4. Create one subscription per requested event kind, bound to the
//!    session id.
//!
//! A background task then reads frames: notifications become
//! [`ChannelEvent`]s, keepalives are ignored, `session_reconnect` moves to
//! the new URL (subscriptions carry over), revocations are logged. When
//! the connection drops, the task opens a fresh session (new token, new
//! socket, subscriptions created again) with exponential backoff, and
//! gives up only if authentication fails.

use super::token::{TokenRecord, TokenStore};
use super::{ChannelEvent, EventClient, EventKinds};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const HELIX_URL: &str = "https://api.twitch.tv/helix";
const EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_GRACE: Duration = Duration::from_secs(2);
const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Application credentials and the channel to listen to.
#[derive(Clone, PartialEq, Eq)]
pub struct TwitchCredentials {
    /// Application client id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
    /// Channel login name.
    pub username: String,
}

impl std::fmt::Debug for TwitchCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// One decoded EventSub frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSubFrame {
    /// Session established.
    Welcome {
        /// Session id to bind subscriptions to.
        session_id: String,
    },
    /// Connection still alive.
    Keepalive,
    /// Server asks the client to move to a new URL.
    Reconnect {
        /// Where to reconnect.
        url: String,
    },
    /// A subscribed event.
    Notification(ChannelEvent),
    /// A subscription was revoked.
    Revocation {
        /// Revoked subscription type.
        subscription_type: String,
    },
    /// A message type or subscription type this client does not handle.
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    metadata: Metadata,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct Metadata {
    message_type: String,
    #[serde(default)]
    subscription_type: Option<String>,
}

#[derive(Deserialize)]
struct SessionPayload {
    session: Session,
}

#[derive(Deserialize)]
struct Session {
    id: String,
    #[serde(default)]
    reconnect_url: Option<String>,
}

#[derive(Deserialize)]
struct NotificationPayload {
    event: Value,
}

#[derive(Deserialize)]
struct UserEvent {
    user_name: String,
}

#[derive(Deserialize)]
struct GiftEvent {
    #[serde(default)]
    user_name: Option<String>,
    total: u64,
    #[serde(default)]
    is_anonymous: bool,
}

/// Decode one EventSub text frame.
pub fn parse_frame(text: &str) -> Result<EventSubFrame> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let frame = match envelope.metadata.message_type.as_str() {
        "session_welcome" => {
            let payload: SessionPayload = serde_json::from_value(envelope.payload)?;
            EventSubFrame::Welcome {
                session_id: payload.session.id,
            }
        }
        "session_keepalive" => EventSubFrame::Keepalive,
        "session_reconnect" => {
            let payload: SessionPayload = serde_json::from_value(envelope.payload)?;
            let url = payload
                .session
                .reconnect_url
                .ok_or_else(|| Error::protocol("session_reconnect without reconnect_url"))?;
            EventSubFrame::Reconnect { url }
        }
        "revocation" => EventSubFrame::Revocation {
            subscription_type: envelope.metadata.subscription_type.unwrap_or_default(),
        },
        "notification" => {
            let subscription_type = envelope
                .metadata
                .subscription_type
                .ok_or_else(|| Error::protocol("notification without subscription_type"))?;
            let payload: NotificationPayload = serde_json::from_value(envelope.payload)?;
            match subscription_type.as_str() {
                "channel.subscribe" => {
                    let event: UserEvent = serde_json::from_value(payload.event)?;
                    EventSubFrame::Notification(ChannelEvent::Subscribe {
                        user_name: event.user_name,
                    })
                }
                "channel.subscription.gift" => {
                    let event: GiftEvent = serde_json::from_value(payload.event)?;
                    EventSubFrame::Notification(ChannelEvent::SubscriptionGift {
                        user_name: event.user_name.filter(|_| !event.is_anonymous),
                        total: event.total,
                    })
                }
                "channel.follow" => {
                    let event: UserEvent = serde_json::from_value(payload.event)?;
                    EventSubFrame::Notification(ChannelEvent::Follow {
                        user_name: event.user_name,
                    })
                }
                _ => EventSubFrame::Other(subscription_type),
            }
        }
        other => EventSubFrame::Other(other.to_string()),
    };
    Ok(frame)
}

/// Subscription type and version for each event kind.
fn subscription_types(kinds: EventKinds) -> Vec<(&'static str, &'static str, EventKinds)> {
    [
        ("channel.subscribe", "1", EventKinds::SUBSCRIBE),
        ("channel.subscription.gift", "1", EventKinds::SUBSCRIPTION_GIFT),
        ("channel.follow", "2", EventKinds::FOLLOW),
    ]
    .into_iter()
    .filter(|(_, _, kind)| kinds.contains(*kind))
    .collect()
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct UsersResponse {
    data: Vec<User>,
}

#[derive(Deserialize)]
struct User {
    id: String,
}

/// Helix and OAuth calls for one channel.
#[derive(Clone)]
struct HelixApi {
    credentials: TwitchCredentials,
    store: TokenStore,
    http: reqwest::Client,
}

impl HelixApi {
    /// Exchange the stored refresh token for a new pair and persist it.
    async fn refresh(&self) -> Result<TokenRecord> {
        let stored = self.store.load()?;
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", stored.refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::auth(format!(
                "token refresh rejected ({status}); re-authenticate"
            )));
        }
        let fresh: RefreshResponse = response.json().await?;
        let record = TokenRecord {
            token: fresh.access_token,
            refresh_token: fresh.refresh_token,
        };
        self.store.save(&record)?;
        info!(path = %self.store.path().display(), "user token refreshed and saved");
        Ok(record)
    }

    /// Resolve the channel login to its user id.
    async fn broadcaster_id(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{HELIX_URL}/users"))
            .query(&[("login", self.credentials.username.as_str())])
            .header("Client-Id", &self.credentials.client_id)
            .bearer_auth(access_token)
            .send()
            .await?;
        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(Error::auth(format!("user lookup rejected ({})", response.status())));
        }
        let users: UsersResponse = response.error_for_status()?.json().await?;
        users
            .data
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| Error::ChannelNotFound(self.credentials.username.clone()))
    }

    async fn subscribe(
        &self,
        access_token: &str,
        session_id: &str,
        broadcaster_id: &str,
        kinds: EventKinds,
    ) -> Result<()> {
        for (kind, version, flag) in subscription_types(kinds) {
            let condition = if flag == EventKinds::FOLLOW {
                json!({ "broadcaster_user_id": broadcaster_id, "moderator_user_id": broadcaster_id })
            } else {
                json!({ "broadcaster_user_id": broadcaster_id })
            };
            let body = json!({
                "type": kind,
                "version": version,
                "condition": condition,
                "transport": { "method": "websocket", "session_id": session_id },
            });
            let response = self
                .http
                .post(format!("{HELIX_URL}/eventsub/subscriptions"))
                .header("Client-Id", &self.credentials.client_id)
                .bearer_auth(access_token)
                .json(&body)
                .send()
                .await?;
            match response.status() {
                status if status.is_success() || status == StatusCode::CONFLICT => {
                    debug!(kind, "subscription registered");
                }
                status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                    return Err(Error::auth(format!("subscription {kind} rejected ({status})")));
                }
                status => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(Error::protocol(format!(
                        "subscription {kind} failed ({status}): {text}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Connect and wait for the welcome frame. Returns the stream and session id.
async fn connect_session(url: &str) -> Result<(WsStream, String)> {
    let (mut ws, _) = connect_async(url).await?;
    let welcome = async {
        while let Some(message) = ws.next().await {
            if let Message::Text(text) = message? {
                match parse_frame(text.as_str())? {
                    EventSubFrame::Welcome { session_id } => return Ok(session_id),
                    other => trace!(?other, "frame before welcome"),
                }
            }
        }
        Err::<String, Error>(Error::protocol("socket closed before session_welcome"))
    };
    let session_id = tokio::time::timeout(WELCOME_TIMEOUT, welcome)
        .await
        .map_err(|_| Error::protocol("timed out waiting for session_welcome"))??;
    debug!(%session_id, "eventsub session established");
    Ok((ws, session_id))
}

/// Exponential delay between attempts to replace a lost session.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    min: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max, next: min }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.next = self.min;
    }
}

/// Where session streams come from.
#[async_trait]
trait SessionSource: Send + Sync + 'static {
    type Stream: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send;

    /// Open a brand-new session with every subscription in place.
    async fn open(&self) -> Result<Self::Stream>;

    /// Move to the URL from a `session_reconnect`; subscriptions carry over.
    async fn follow(&self, url: &str) -> Result<Self::Stream>;

    /// Close a stream that is being abandoned.
    async fn close(&self, stream: &mut Self::Stream);
}

/// The live EventSub endpoint for one broadcaster.
struct EventSubSource {
    api: HelixApi,
    broadcaster_id: String,
    kinds: EventKinds,
}

impl EventSubSource {
    async fn connect(&self, access_token: &str) -> Result<WsStream> {
        let (ws, session_id) = connect_session(EVENTSUB_URL).await?;
        self.api
            .subscribe(access_token, &session_id, &self.broadcaster_id, self.kinds)
            .await?;
        Ok(ws)
    }
}

#[async_trait]
impl SessionSource for EventSubSource {
    type Stream = WsStream;

    async fn open(&self) -> Result<WsStream> {
        let record = self.api.refresh().await?;
        self.connect(&record.token).await
    }

    async fn follow(&self, url: &str) -> Result<WsStream> {
        connect_session(url).await.map(|(ws, _)| ws)
    }

    async fn close(&self, stream: &mut WsStream) {
        let _ = stream.close(None).await;
    }
}

/// How a session's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Stop requested or nobody is listening any more.
    Stopped,
    /// The connection went away.
    Lost,
}

/// Read frames from one stream until it is lost or the session stops.
async fn read_frames<S: SessionSource>(
    source: &S,
    stream: &mut S::Stream,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    loop {
        let message = tokio::select! {
            _ = &mut *shutdown => {
                source.close(stream).await;
                debug!("eventsub session closed");
                return SessionEnd::Stopped;
            }
            message = stream.next() => message,
        };
        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                warn!(?frame, "eventsub socket closed by server");
                return SessionEnd::Lost;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "eventsub socket error");
                return SessionEnd::Lost;
            }
            None => {
                warn!("eventsub socket ended");
                return SessionEnd::Lost;
            }
        };
        match parse_frame(text.as_str()) {
            Ok(EventSubFrame::Notification(event)) => {
                if events.send(event).is_err() {
                    return SessionEnd::Stopped;
                }
            }
            Ok(EventSubFrame::Keepalive) => trace!("keepalive"),
            Ok(EventSubFrame::Reconnect { url }) => {
                info!(%url, "eventsub reconnect requested");
                match source.follow(&url).await {
                    Ok(next) => {
                        source.close(stream).await;
                        *stream = next;
                    }
                    Err(e) => {
                        warn!(error = %e, "eventsub reconnect failed");
                        return SessionEnd::Lost;
                    }
                }
            }
            Ok(EventSubFrame::Revocation { subscription_type }) => {
                warn!(subscription_type, "subscription revoked");
            }
            Ok(EventSubFrame::Welcome { .. }) => debug!("unexpected session_welcome"),
            Ok(EventSubFrame::Other(kind)) => debug!(kind, "unhandled eventsub frame"),
            Err(e) => warn!(error = %e, "undecodable eventsub frame"),
        }
    }
}

/// Keep a session alive: read frames, and replace a lost connection with a
/// fresh session after a backoff delay. Ends on stop, when the event
/// receiver goes away, or when reconnecting fails authentication.
async fn supervise_session<S: SessionSource>(
    source: S,
    mut stream: S::Stream,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
    mut backoff: Backoff,
) {
    loop {
        if read_frames(&source, &mut stream, &events, &mut shutdown).await == SessionEnd::Stopped {
            return;
        }
        stream = loop {
            let delay = backoff.next_delay();
            info!(?delay, "reconnecting eventsub");
            tokio::select! {
                _ = &mut shutdown => return,
                () = tokio::time::sleep(delay) => {}
            }
            match source.open().await {
                Ok(next) => {
                    backoff.reset();
                    info!("eventsub session restored");
                    break next;
                }
                Err(e) if e.is_auth() => {
                    error!(error = %e, "eventsub reconnect rejected, giving up");
                    return;
                }
                Err(e) => warn!(error = %e, "eventsub reconnect failed"),
            }
        };
    }
}

/// EventSub WebSocket client for one channel.
pub struct TwitchClient {
    api: HelixApi,
    session: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl TwitchClient {
    /// Create a client; nothing connects until [`EventClient::start`].
    pub fn new(credentials: TwitchCredentials, store: TokenStore) -> Self {
        Self {
            api: HelixApi {
                credentials,
                store,
                http: reqwest::Client::new(),
            },
            session: None,
        }
    }
}

#[async_trait]
impl EventClient for TwitchClient {
    async fn start(
        &mut self,
        kinds: EventKinds,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<()> {
        let record = self.api.refresh().await?;
        let broadcaster_id = self.api.broadcaster_id(&record.token).await?;
        info!(channel = %self.api.credentials.username, %broadcaster_id, "channel resolved");

        let source = EventSubSource {
            api: self.api.clone(),
            broadcaster_id,
            kinds,
        };
        let ws = source.connect(&record.token).await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let backoff = Backoff::new(RECONNECT_MIN, RECONNECT_MAX);
        let task = tokio::spawn(supervise_session(source, ws, events, stop_rx, backoff));
        self.session = Some((stop_tx, task));
        info!(?kinds, "listening for channel events");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some((stop_tx, mut task)) = self.session.take() {
            let _ = stop_tx.send(());
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        Ok(())
    }
}
