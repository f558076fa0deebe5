//! Philips Hue bridge lighting.
//!
//! Talks to the bridge's v1 REST API. The bridge answers most failures with
//! HTTP 200 and a body like `[{"error": {"type": 1, "description": "..."}}]`,
//! so every response body is inspected.

use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::config::HueConfig;
use crate::notify::Lights;

/// Full saturation and brightness on the bridge's scale
const MAX_LEVEL: u8 = 254;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum HueError {
    #[error("request to Hue bridge failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Hue bridge returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Hue bridge rejected command: {0}")]
    Bridge(String),
}

/// Body of `PUT /lights/{id}/state`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightStateCommand {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
}

impl LightStateCommand {
    pub fn color(hue: u16) -> Self {
        Self {
            on: true,
            hue: Some(hue),
            sat: Some(MAX_LEVEL),
            bri: Some(MAX_LEVEL),
        }
    }

    pub fn off() -> Self {
        Self {
            on: false,
            hue: None,
            sat: None,
            bri: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct BridgeResult {
    error: Option<BridgeError>,
}

/// Collect the error descriptions from a bridge response body, if any
fn bridge_errors(body: &serde_json::Value) -> Option<String> {
    let results: Vec<BridgeResult> = serde_json::from_value(body.clone()).ok()?;
    let errors: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.error.map(|e| e.description))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

pub struct HueBridge {
    client: reqwest::Client,
    base_url: String,
    configured_lights: Vec<String>,
    discovered_lights: Vec<String>,
}

impl HueBridge {
    /// Create a bridge client; `bridge` may be a bare host or a full URL
    pub fn new(config: &HueConfig) -> Result<Self, HueError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let bridge = config.bridge.trim().trim_end_matches('/');
        let root = if bridge.starts_with("http://") || bridge.starts_with("https://") {
            bridge.to_string()
        } else {
            format!("http://{}", bridge)
        };

        Ok(Self {
            client,
            base_url: format!("{}/api/{}", root, config.username),
            configured_lights: config.lights.clone(),
            discovered_lights: Vec::new(),
        })
    }

    /// Ask the bridge which lights it knows about
    pub async fn discover(&mut self) -> Result<&[String], HueError> {
        let url = format!("{}/lights", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HueError::Status(status));
        }

        let body: serde_json::Value = response.json().await?;
        if let Some(errors) = bridge_errors(&body) {
            return Err(HueError::Bridge(errors));
        }

        let mut ids: Vec<String> = body
            .as_object()
            .map(|lights| lights.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();

        info!("Discovered {} Hue lights: {:?}", ids.len(), ids);
        self.discovered_lights = ids;
        Ok(&self.discovered_lights)
    }

    /// Lights to command: the configured ones, else the discovered ones
    async fn light_ids(&mut self) -> Result<Vec<String>, HueError> {
        if !self.configured_lights.is_empty() {
            return Ok(self.configured_lights.clone());
        }
        if self.discovered_lights.is_empty() {
            self.discover().await?;
        }
        Ok(self.discovered_lights.clone())
    }

    async fn put_state(&self, id: &str, command: &LightStateCommand) -> Result<(), HueError> {
        let url = format!("{}/lights/{}/state", self.base_url, id);
        let response = self.client.put(&url).json(command).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HueError::Status(status));
        }

        let body: serde_json::Value = response.json().await?;
        match bridge_errors(&body) {
            Some(errors) => Err(HueError::Bridge(errors)),
            None => Ok(()),
        }
    }

    /// Send `command` to every light, trying all of them before reporting
    async fn broadcast(&mut self, command: LightStateCommand) -> Result<(), HueError> {
        let ids = self.light_ids().await?;

        let mut first_error = None;
        for id in &ids {
            if let Err(e) = self.put_state(id, &command).await {
                warn!("Hue light {} did not accept {:?}: {}", id, command, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Lights for HueBridge {
    async fn set_all_lights(&mut self, hue: u16) -> Result<(), Box<dyn Error + Send>> {
        self.broadcast(LightStateCommand::color(hue))
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send>)
    }

    async fn turn_off_all_lights(&mut self) -> Result<(), Box<dyn Error + Send>> {
        self.broadcast(LightStateCommand::off())
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bridge: &str) -> HueConfig {
        HueConfig {
            enabled: true,
            bridge: bridge.to_string(),
            username: "brewd-user".to_string(),
            lights: Vec::new(),
        }
    }

    #[test]
    fn test_base_url_from_bare_host() {
        let bridge = HueBridge::new(&config("192.168.1.2")).unwrap();
        assert_eq!(bridge.base_url, "http://192.168.1.2/api/brewd-user");
    }

    #[test]
    fn test_base_url_keeps_scheme() {
        let bridge = HueBridge::new(&config("https://hue.local/")).unwrap();
        assert_eq!(bridge.base_url, "https://hue.local/api/brewd-user");
    }

    #[test]
    fn test_color_command_payload() {
        let json = serde_json::to_value(LightStateCommand::color(29000)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"on": true, "hue": 29000, "sat": 254, "bri": 254})
        );
    }

    #[test]
    fn test_off_command_payload() {
        let json = serde_json::to_value(LightStateCommand::off()).unwrap();
        assert_eq!(json, serde_json::json!({"on": false}));
    }

    #[test]
    fn test_bridge_errors() {
        let ok = serde_json::json!([{"success": {"/lights/1/state/on": true}}]);
        assert_eq!(bridge_errors(&ok), None);

        let failed = serde_json::json!([
            {"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}
        ]);
        assert_eq!(bridge_errors(&failed), Some("unauthorized user".to_string()));

        let lights = serde_json::json!({"1": {"name": "Kitchen"}});
        assert_eq!(bridge_errors(&lights), None);
    }
}
