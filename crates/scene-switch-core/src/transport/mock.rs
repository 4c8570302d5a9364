//! In-memory host for tests
//!
//! [`MockHost`] plays the host application's scene service: it answers
//! `getScenes` and `makeSceneActive`, keeps track of the active scene, and
//! records every request it receives. Failure switches simulate a host that
//! is not running, a broken pipe, garbled responses, or rejected switches.

use super::{Connector, PipeTransport, Result, TransportError};
use crate::protocol::{GET_SCENES, MAKE_SCENE_ACTIVE, RpcRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct HostState {
    scenes: Vec<(Value, String)>,
    active: Option<Value>,
    fail_connect: bool,
    fail_send: bool,
    silent: bool,
    garbage_responses: usize,
    reject_activation: Option<Value>,
    connect_attempts: usize,
    requests: Vec<RpcRequest>,
}

/// Shared, scriptable fake host. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with scenes named `names`; ids are `scene_<index>`.
    pub fn with_scenes(names: &[&str]) -> Self {
        let host = Self::new();
        host.set_scenes(names);
        host
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_scenes(&self, names: &[&str]) {
        self.state().scenes = names
            .iter()
            .enumerate()
            .map(|(i, name)| (json!(format!("scene_{i}")), (*name).to_string()))
            .collect();
    }

    /// Refuse every connection attempt, as when the host is not running.
    pub fn set_fail_connect(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    /// Fail every write on open connections.
    pub fn set_fail_send(&self, fail: bool) {
        self.state().fail_send = fail;
    }

    /// Accept requests but never answer them.
    pub fn set_silent(&self, silent: bool) {
        self.state().silent = silent;
    }

    /// Answer the next `count` requests with a line that is not JSON.
    pub fn set_garbage_responses(&self, count: usize) {
        self.state().garbage_responses = count;
    }

    /// Answer `makeSceneActive` with this `error` value (`None` to accept).
    pub fn set_reject_activation(&self, error: Option<Value>) {
        self.state().reject_activation = error;
    }

    /// Name of the scene the host currently has active.
    pub fn active_scene(&self) -> Option<String> {
        let state = self.state();
        let active = state.active.as_ref()?;
        state
            .scenes
            .iter()
            .find(|(id, _)| id == active)
            .map(|(_, name)| name.clone())
    }

    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.state().requests.clone()
    }

    /// Methods of all recorded requests, in order.
    pub fn methods(&self) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    /// Produce the response line for one request line.
    fn respond(&self, line: &[u8]) -> Option<String> {
        let mut state = self.state();
        if state.silent {
            return None;
        }
        let request: RpcRequest = match serde_json::from_slice(line) {
            Ok(request) => request,
            Err(e) => {
                return Some(format!("{}\n", json!({"error": {"code": -32700, "message": e.to_string()}})));
            }
        };
        state.requests.push(request.clone());

        if state.garbage_responses > 0 {
            state.garbage_responses -= 1;
            return Some("{\"result\": [oops\n".to_string());
        }

        let body = match request.method.as_str() {
            GET_SCENES => {
                let scenes: Vec<Value> = state
                    .scenes
                    .iter()
                    .map(|(id, name)| json!({"id": id, "name": name, "resourceId": format!("Scene[\"{name}\"]")}))
                    .collect();
                json!({"jsonrpc": "2.0", "id": request.id, "result": scenes})
            }
            MAKE_SCENE_ACTIVE => {
                let target = request
                    .params
                    .args
                    .as_ref()
                    .and_then(|args| args.first())
                    .cloned();
                if let Some(error) = state.reject_activation.clone() {
                    json!({"jsonrpc": "2.0", "id": request.id, "error": error})
                } else if let Some(target) = target.filter(|t| state.scenes.iter().any(|(id, _)| id == t)) {
                    state.active = Some(target);
                    json!({"jsonrpc": "2.0", "id": request.id, "result": true})
                } else {
                    json!({"jsonrpc": "2.0", "id": request.id, "error": {"code": -32602, "message": "scene not found"}})
                }
            }
            other => {
                json!({"jsonrpc": "2.0", "id": request.id, "error": {"code": -32601, "message": format!("unknown method {other}")}})
            }
        };
        Some(format!("{body}\n"))
    }
}

/// Connector that hands out [`MockTransport`]s bound to one [`MockHost`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    host: MockHost,
}

impl MockConnector {
    pub fn new(host: MockHost) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    fn address(&self) -> &str {
        "mock://host"
    }

    async fn connect(&self) -> Result<MockTransport> {
        let refuse = {
            let mut state = self.host.state();
            state.connect_attempts += 1;
            state.fail_connect
        };
        if refuse {
            return Err(TransportError::Connect {
                address: self.address().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "pipe not found"),
            });
        }
        Ok(MockTransport {
            host: self.host.clone(),
            pending: None,
            open: true,
        })
    }
}

/// One open connection to a [`MockHost`].
#[derive(Debug)]
pub struct MockTransport {
    host: MockHost,
    pending: Option<String>,
    open: bool,
}

#[async_trait]
impl PipeTransport for MockTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if self.host.state().fail_send {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe is being closed",
            )));
        }
        self.pending = self.host.respond(bytes);
        Ok(())
    }

    async fn receive_line(&mut self) -> Result<String> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        match self.pending.take() {
            Some(line) => Ok(line),
            None => Err(TransportError::Timeout(Duration::from_secs(5))),
        }
    }

    async fn close(&mut self) {
        self.open = false;
        self.pending = None;
    }
}
