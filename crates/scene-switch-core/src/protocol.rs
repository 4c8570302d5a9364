//! Wire protocol for the host's scene service.
//!
//! The host speaks newline-delimited JSON over the pipe:
//!
//! ```json
//! // Request
//! {"method":"makeSceneActive","params":{"resource":"ScenesService","args":["scene_42"]},"id":7}
//! // Response
//! {"jsonrpc":"2.0","id":7,"result":true}
//! ```
//!
//! Only two methods are used: [`GET_SCENES`] and [`MAKE_SCENE_ACTIVE`], both
//! against the [`SCENES_SERVICE`] resource.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resource namespace for scene operations.
pub const SCENES_SERVICE: &str = "ScenesService";

/// Lists all scenes. Result is an array of scene objects.
pub const GET_SCENES: &str = "getScenes";

/// Activates a scene by id. Takes the scene id as its only argument.
pub const MAKE_SCENE_ACTIVE: &str = "makeSceneActive";

/// A request sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Method name (e.g., `"getScenes"`).
    pub method: String,
    /// Target resource and positional arguments.
    pub params: RpcParams,
    /// Request identifier. The host echoes it but nothing correlates on it.
    pub id: u64,
}

/// `params` object of an [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcParams {
    /// Service namespace the method belongs to.
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

impl RpcRequest {
    pub fn new(
        method: impl Into<String>,
        resource: impl Into<String>,
        args: Option<Vec<Value>>,
        id: u64,
    ) -> Self {
        Self {
            method: method.into(),
            params: RpcParams {
                resource: resource.into(),
                args,
            },
            id,
        }
    }

    /// `getScenes` on the scene service.
    pub fn get_scenes(id: u64) -> Self {
        Self::new(GET_SCENES, SCENES_SERVICE, Some(Vec::new()), id)
    }

    /// `makeSceneActive` with `scene_id` as the only argument.
    pub fn make_scene_active(scene_id: Value, id: u64) -> Self {
        Self::new(MAKE_SCENE_ACTIVE, SCENES_SERVICE, Some(vec![scene_id]), id)
    }

    /// Serialize as a single compact JSON line terminated by `\n`.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A response received from the host.
///
/// Unknown fields (`jsonrpc`, etc.) are ignored. A `null` `error` is read as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Decode one response line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// `true` when the host reported no error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Interpret `result` as a scene list.
    ///
    /// Returns `None` when there is no result or it is not an array. Array
    /// entries that do not look like scenes are skipped.
    pub fn scenes(&self) -> Option<Vec<Scene>> {
        let entries = self.result.as_ref()?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect(),
        )
    }
}

/// One scene entry from a `getScenes` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Host-assigned identifier, passed back verbatim to `makeSceneActive`.
    pub id: Value,
    /// Display name configured in the host.
    pub name: String,
    /// Any other fields the host sends (nodes, resource ids, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Find the id of the first scene named exactly `name`.
pub fn find_scene_id<'a>(scenes: &'a [Scene], name: &str) -> Option<&'a Value> {
    scenes.iter().find(|scene| scene.name == name).map(|scene| &scene.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_scenes_request_is_single_line() {
        let line = RpcRequest::get_scenes(1).to_line().unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(
            value,
            json!({"method": "getScenes", "params": {"resource": "ScenesService", "args": []}, "id": 1})
        );
    }

    #[test]
    fn test_request_without_args_omits_key() {
        let request = RpcRequest::new(GET_SCENES, SCENES_SERVICE, None, 3);
        let line = request.to_line().unwrap();
        assert_eq!(
            line,
            "{\"method\":\"getScenes\",\"params\":{\"resource\":\"ScenesService\"},\"id\":3}\n"
        );
    }

    #[test]
    fn test_make_scene_active_carries_id_argument() {
        let request = RpcRequest::make_scene_active(json!("scene_7"), 100);
        assert_eq!(request.method, MAKE_SCENE_ACTIVE);
        assert_eq!(request.params.args, Some(vec![json!("scene_7")]));
    }

    #[test]
    fn test_scene_list_parses_without_loss() {
        let line = r#"{"jsonrpc":"2.0","id":1,"result":[{"id":"scene_a","name":"In game","nodes":[]},{"id":"scene_b","name":"Menu"}]}"#;
        let response = RpcResponse::parse(line).unwrap();

        let scenes = response.scenes().unwrap();
        let pairs: Vec<(Value, String)> = scenes
            .iter()
            .map(|s| (s.id.clone(), s.name.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (json!("scene_a"), "In game".to_string()),
                (json!("scene_b"), "Menu".to_string()),
            ]
        );
        assert!(scenes[0].extra.contains_key("nodes"));
    }

    #[test]
    fn test_malformed_scene_entries_are_skipped() {
        let response = RpcResponse::parse(r#"{"result":[{"id":1},"junk",{"id":2,"name":"Menu"}]}"#)
            .unwrap();
        let scenes = response.scenes().unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(find_scene_id(&scenes, "Menu"), Some(&json!(2)));
    }

    #[test]
    fn test_non_list_result_has_no_scenes() {
        let response = RpcResponse::parse(r#"{"result":true}"#).unwrap();
        assert!(response.scenes().is_none());
        assert!(RpcResponse::default().scenes().is_none());
    }

    #[test]
    fn test_error_absent_or_null_is_success() {
        assert!(RpcResponse::parse(r#"{"result":true}"#).unwrap().is_success());
        assert!(RpcResponse::parse(r#"{"result":true,"error":null}"#).unwrap().is_success());
        assert!(!RpcResponse::parse(r#"{"error":{"code":-32600}}"#).unwrap().is_success());
        assert!(!RpcResponse::parse(r#"{"error":false}"#).unwrap().is_success());
    }

    #[test]
    fn test_parse_trims_trailing_newline() {
        assert!(RpcResponse::parse("{\"result\":[]}\r\n").is_ok());
        assert!(RpcResponse::parse("{\"result\":").is_err());
    }

    #[test]
    fn test_find_scene_id_missing() {
        assert!(find_scene_id(&[], "Nonexistent").is_none());
    }
}
