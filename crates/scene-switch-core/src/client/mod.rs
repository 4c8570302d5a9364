//! Scene RPC client
//!
//! Holds at most one open transport to the host and re-establishes it on
//! demand with the [`ReconnectPolicy`]. Every call is a strict
//! request-then-response exchange; a second request is never written before
//! the previous response has been consumed.
//!
//! Expected failures (host down, scene missing, switch rejected) come back as
//! typed errors from the `try_*` methods. [`SceneClient::resolve_scene_id`]
//! and [`SceneClient::activate_scene`] wrap them in bounded retries and
//! collapse the outcome to `Option`/`bool`.

mod reconnect;

pub use reconnect::{RECONNECT_COOLDOWN, ReconnectPlan, ReconnectPolicy};

use crate::config::Config;
use crate::protocol::{
    GET_SCENES, MAKE_SCENE_ACTIVE, RpcRequest, RpcResponse, SCENES_SERVICE, find_scene_id,
};
use crate::transport::{Connector, PipeTransport, TransportError};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Attempts made by [`SceneClient::resolve_scene_id`] and [`SceneClient::activate_scene`].
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between those attempts.
pub const RETRY_SPACING: Duration = Duration::from_secs(1);

/// Failure of a single request/response exchange.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("not connected to host")]
    NotConnected,

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to send request: {0}")]
    Send(#[source] TransportError),

    #[error("failed to read response: {0}")]
    Receive(#[source] TransportError),

    #[error("failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failure of one scene lookup or switch attempt.
#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("scene '{0}' not found on host")]
    SceneNotFound(String),

    #[error("host response carries no scene list")]
    NoSceneList,

    #[error("host rejected the switch: {0}")]
    Rejected(Value),

    #[error(transparent)]
    Call(#[from] CallError),
}

/// RPC client for the host's scene service.
pub struct SceneClient<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
    policy: ReconnectPolicy,
    failed_connections: u32,
    next_id: u64,
    max_attempts: u32,
    retry_spacing: Duration,
}

impl<C: Connector> SceneClient<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            transport: None,
            policy,
            failed_connections: 0,
            next_id: 1,
            max_attempts: MAX_ATTEMPTS,
            retry_spacing: RETRY_SPACING,
        }
    }

    /// Client with the reconnect ceiling and delay unit from `config`.
    pub fn from_config(connector: C, config: &Config) -> Self {
        Self::new(
            connector,
            ReconnectPolicy::new(config.reconnect_attempts, config.reconnect_delay()),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Consecutive failed connect attempts since the last success or cooldown.
    pub fn failed_connections(&self) -> u32 {
        self.failed_connections
    }

    pub fn address(&self) -> &str {
        self.connector.address()
    }

    fn next_request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Make sure a transport is open, connecting if needed.
    ///
    /// Applies the reconnect policy before the attempt: linear backoff after
    /// failures, and a fixed cooldown (which resets the failure counter) once
    /// the ceiling is reached. Returns `false` when the attempt fails; the
    /// failure is counted, not raised.
    pub async fn ensure_connected(&mut self) -> bool {
        if self.transport.is_some() {
            return true;
        }

        match self.policy.plan(self.failed_connections) {
            ReconnectPlan::Immediate => {}
            ReconnectPlan::Backoff(delay) => {
                info!(
                    "Waiting {:?} before reconnecting (attempt {})",
                    delay,
                    self.failed_connections + 1
                );
                sleep(delay).await;
            }
            ReconnectPlan::Cooldown(delay) => {
                error!(
                    "Reached the limit of {} reconnect attempts; cooldown of {:?} before retrying",
                    self.policy.ceiling, delay
                );
                sleep(delay).await;
                self.failed_connections = 0;
            }
        }

        info!("Connecting to host pipe: {}", self.connector.address());
        match self.connector.connect().await {
            Ok(transport) => {
                info!("Connected to host pipe");
                self.transport = Some(transport);
                self.failed_connections = 0;
                true
            }
            Err(e) => {
                self.failed_connections += 1;
                warn!("Failed to connect to host pipe: {e}");
                if self.failed_connections >= self.policy.ceiling {
                    warn!("Is the streaming host running? Make sure it is open.");
                }
                false
            }
        }
    }

    /// Drop the current transport after a connection-level failure.
    async fn discard_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    /// One request/response exchange.
    ///
    /// A failed write or read drops the transport so the next call
    /// reconnects. An undecodable response keeps it: the stream is still
    /// usable, only that message was bad.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn call(
        &mut self,
        method: &str,
        resource: &str,
        args: Option<Vec<Value>>,
        id: u64,
    ) -> Result<RpcResponse, CallError> {
        if !self.ensure_connected().await {
            return Err(CallError::NotConnected);
        }

        let request = RpcRequest::new(method, resource, args, id);
        let line = request.to_line().map_err(CallError::Encode)?;
        debug!("Sending {method} (id {id})");

        let sent = match self.transport.as_mut() {
            Some(transport) => transport.send(line.as_bytes()).await,
            None => return Err(CallError::NotConnected),
        };
        if let Err(e) = sent {
            error!("Failed sending {method} request: {e}");
            self.discard_transport().await;
            return Err(CallError::Send(e));
        }

        let received = match self.transport.as_mut() {
            Some(transport) => transport.receive_line().await,
            None => return Err(CallError::NotConnected),
        };
        let response_line = match received {
            Ok(line) => line,
            Err(e) if e.is_framing() => {
                error!("Failed decoding {method} response: {e}");
                return Err(CallError::Receive(e));
            }
            Err(e) => {
                error!("Failed reading {method} response: {e}");
                self.discard_transport().await;
                return Err(CallError::Receive(e));
            }
        };

        RpcResponse::parse(&response_line).map_err(|e| {
            error!("Failed parsing {method} response as JSON: {e}");
            CallError::Decode(e)
        })
    }

    /// Look up a scene id by name with a single `getScenes` call.
    ///
    /// # Errors
    ///
    /// [`SwitchError::SceneNotFound`] when no scene has that exact name,
    /// [`SwitchError::NoSceneList`] when the result is not a list, or the
    /// underlying [`CallError`].
    pub async fn try_resolve_scene_id(&mut self, name: &str) -> Result<Value, SwitchError> {
        let id = self.next_request_id();
        let response = self
            .call(GET_SCENES, SCENES_SERVICE, Some(Vec::new()), id)
            .await?;
        let scenes = response.scenes().ok_or(SwitchError::NoSceneList)?;
        find_scene_id(&scenes, name)
            .cloned()
            .ok_or_else(|| SwitchError::SceneNotFound(name.to_string()))
    }

    /// Resolve a scene id, retrying up to [`MAX_ATTEMPTS`] times.
    ///
    /// A scene that genuinely does not exist also uses all attempts.
    pub async fn resolve_scene_id(&mut self, name: &str) -> Option<Value> {
        for attempt in 1..=self.max_attempts {
            match self.try_resolve_scene_id(name).await {
                Ok(id) => return Some(id),
                Err(e) => warn!(
                    "Could not resolve scene '{name}' (attempt {attempt}/{}): {e}",
                    self.max_attempts
                ),
            }
            if attempt < self.max_attempts {
                sleep(self.retry_spacing).await;
            }
        }
        error!(
            "Could not get the id of scene '{name}' after {} attempts",
            self.max_attempts
        );
        None
    }

    /// One switch attempt: `getScenes`, then `makeSceneActive` with the id.
    ///
    /// # Errors
    ///
    /// Any lookup error, or [`SwitchError::Rejected`] when the ack carries a
    /// non-null `error`.
    pub async fn try_activate_scene(&mut self, name: &str) -> Result<(), SwitchError> {
        let scene_id = self.try_resolve_scene_id(name).await?;
        let id = self.next_request_id();
        let ack = self
            .call(MAKE_SCENE_ACTIVE, SCENES_SERVICE, Some(vec![scene_id]), id)
            .await?;
        match ack.error {
            None => Ok(()),
            Some(error) => Err(SwitchError::Rejected(error)),
        }
    }

    /// Switch the host to scene `name`, retrying the whole two-step exchange
    /// up to [`MAX_ATTEMPTS`] times. Returns `true` once the host acks.
    pub async fn activate_scene(&mut self, name: &str) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.try_activate_scene(name).await {
                Ok(()) => {
                    info!("Switched to scene: {name}");
                    return true;
                }
                Err(e) => warn!(
                    "Could not switch to scene '{name}' (attempt {attempt}/{}): {e}",
                    self.max_attempts
                ),
            }
            if attempt < self.max_attempts {
                sleep(self.retry_spacing).await;
            }
        }
        error!(
            "Could not switch to scene '{name}' after {} attempts",
            self.max_attempts
        );
        false
    }

    /// Close the transport if one is open. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
            info!("Connection to host closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockConnector, MockHost};
    use serde_json::json;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "expected ~{expected:?}, got {elapsed:?}"
        );
    }

    fn client_for(host: &MockHost, ceiling: u32) -> SceneClient<MockConnector> {
        SceneClient::new(
            MockConnector::new(host.clone()),
            ReconnectPolicy::new(ceiling, Duration::from_secs(2)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_scene_sends_lookup_then_switch() {
        let host = MockHost::with_scenes(&["In game", "Menu"]);
        let mut client = client_for(&host, 5);

        assert!(client.activate_scene("In game").await);

        assert_eq!(host.methods(), vec!["getScenes", "makeSceneActive"]);
        assert_eq!(host.active_scene().as_deref(), Some("In game"));
        let requests = host.requests();
        let switch = &requests[1];
        assert_eq!(switch.params.resource, "ScenesService");
        assert_eq!(switch.params.args, Some(vec![json!("scene_0")]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_scene_is_repeatable() {
        let host = MockHost::with_scenes(&["In game", "Menu"]);
        let mut client = client_for(&host, 5);

        assert!(client.activate_scene("Menu").await);
        assert!(client.activate_scene("Menu").await);

        assert_eq!(host.requests().len(), 4);
        assert_eq!(host.active_scene().as_deref(), Some("Menu"));
        assert_eq!(host.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_ids_increase() {
        let host = MockHost::with_scenes(&["Menu"]);
        let mut client = client_for(&host, 5);

        assert!(client.activate_scene("Menu").await);

        let ids: Vec<u64> = host.requests().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_missing_scene_uses_three_spaced_attempts() {
        let host = MockHost::new();
        let mut client = client_for(&host, 5);
        let start = Instant::now();

        assert!(client.resolve_scene_id("Nonexistent").await.is_none());

        assert_eq!(host.methods(), vec!["getScenes"; 3]);
        assert_elapsed(start, Duration::from_secs(2));
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_scene_id_returns_host_id() {
        let host = MockHost::with_scenes(&["Menu", "In game"]);
        let mut client = client_for(&host, 5);

        assert_eq!(client.resolve_scene_id("In game").await, Some(json!("scene_1")));
        assert_eq!(host.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_fails_when_host_is_down() {
        let host = MockHost::with_scenes(&["In game"]);
        host.set_fail_connect(true);
        let mut client = client_for(&host, 5);
        let start = Instant::now();

        assert!(!client.activate_scene("In game").await);

        assert_eq!(host.connect_attempts(), 3);
        assert_eq!(client.failed_connections(), 3);
        assert!(host.requests().is_empty());
        // retry spacing 1s + 1s, backoff 2s + 4s
        assert_elapsed(start, Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_ceiling_triggers_cooldown_and_counter_reset() {
        let host = MockHost::with_scenes(&["Menu"]);
        host.set_fail_connect(true);
        let mut client = client_for(&host, 2);

        assert!(!client.ensure_connected().await);
        assert!(!client.ensure_connected().await);
        assert_eq!(client.failed_connections(), 2);
        assert!(logs_contain("Is the streaming host running?"));

        host.set_fail_connect(false);
        let start = Instant::now();
        assert!(client.ensure_connected().await);

        assert_elapsed(start, RECONNECT_COOLDOWN);
        assert!(logs_contain("cooldown"));
        assert_eq!(client.failed_connections(), 0);
        assert_eq!(host.connect_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_resets_counter_even_if_attempt_fails() {
        let host = MockHost::new();
        host.set_fail_connect(true);
        let mut client = client_for(&host, 2);

        client.ensure_connected().await;
        client.ensure_connected().await;
        client.ensure_connected().await;

        assert_eq!(client.failed_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_connect_resets_counter() {
        let host = MockHost::new();
        host.set_fail_connect(true);
        let mut client = client_for(&host, 5);
        client.ensure_connected().await;
        assert_eq!(client.failed_connections(), 1);

        host.set_fail_connect(false);
        let start = Instant::now();
        assert!(client.ensure_connected().await);

        assert_elapsed(start, Duration::from_secs(2));
        assert_eq!(client.failed_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_discards_transport() {
        let host = MockHost::with_scenes(&["Menu"]);
        let mut client = client_for(&host, 5);
        assert!(client.ensure_connected().await);

        host.set_fail_send(true);
        let err = client
            .call(GET_SCENES, SCENES_SERVICE, None, 9)
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Send(_)));
        assert!(!client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_response_keeps_connection() {
        let host = MockHost::with_scenes(&["Menu"]);
        host.set_garbage_responses(1);
        let mut client = client_for(&host, 5);

        let err = client.try_resolve_scene_id("Menu").await.unwrap_err();
        assert!(matches!(err, SwitchError::Call(CallError::Decode(_))));
        assert!(client.is_connected());

        assert_eq!(client.resolve_scene_id("Menu").await, Some(json!("scene_0")));
        assert_eq!(host.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_host_drops_connection() {
        let host = MockHost::with_scenes(&["Menu"]);
        host.set_silent(true);
        let mut client = client_for(&host, 5);

        let err = client.try_resolve_scene_id("Menu").await.unwrap_err();

        assert!(matches!(
            err,
            SwitchError::Call(CallError::Receive(TransportError::Timeout(_)))
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_switch_is_retried_then_fails() {
        let host = MockHost::with_scenes(&["In game"]);
        host.set_reject_activation(Some(json!({"code": -32000, "message": "busy"})));
        let mut client = client_for(&host, 5);

        assert!(!client.activate_scene("In game").await);

        assert_eq!(host.requests().len(), 6);
        assert!(host.active_scene().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_error_counts_as_success() {
        let host = MockHost::with_scenes(&["In game"]);
        host.set_reject_activation(Some(Value::Null));
        let mut client = client_for(&host, 5);

        assert!(client.try_activate_scene("In game").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let host = MockHost::with_scenes(&["Menu"]);
        let mut client = client_for(&host, 5);
        assert!(client.ensure_connected().await);

        client.close().await;
        client.close().await;

        assert!(!client.is_connected());
    }
}
