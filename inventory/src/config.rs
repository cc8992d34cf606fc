use crate::errors::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;

pub const DEFAULT_API_PREFIX: &str = "/api/iot/inventory";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            host: "0.0.0.0".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7071,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_ip: String,
    pub broker_port: u16,
    pub target_telemetry_topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_ip: "127.0.0.1".to_string(),
            broker_port: 1883,
            target_telemetry_topic: "device/+/temperature".to_string(),
            username: None,
            password: None,
            client_id_prefix: "inventory".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rest: RestConfig,
    pub web: WebConfig,
    pub mqtt: MqttConfig,
    pub demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rest: RestConfig::default(),
            web: WebConfig::default(),
            mqtt: MqttConfig::default(),
            demo_data: true,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!("Reading configuration from {}", path.display());
                let raw = std::fs::read_to_string(path)?;
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies `REST_ADDR`, `WEB_ADDR` and `MQTT_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("REST_ADDR") {
            let (host, port) = split_addr("REST_ADDR", &addr)?;
            self.rest.host = host;
            self.rest.port = port;
        }
        if let Some(addr) = lookup("WEB_ADDR") {
            let (host, port) = split_addr("WEB_ADDR", &addr)?;
            self.web.host = host;
            self.web.port = port;
        }
        if let Some(broker) = lookup("MQTT_BROKER") {
            self.mqtt.broker_ip = broker;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.broker_port = port
                .parse()
                .map_err(|_| Error::Config(format!("MQTT_PORT is not a port: {}", port)))?;
        }
        if let Some(topic) = lookup("MQTT_TOPIC") {
            self.mqtt.target_telemetry_topic = topic;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        Ok(())
    }

    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.rest.host, self.rest.port)
    }

    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.web.host, self.web.port)
    }
}

fn split_addr(key: &str, addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| Error::Config(format!("{} must be host:port, got {}", key, addr)))?;
    let port = port
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid port: {}", key, addr)))?;
    Ok((host.to_string(), port))
}
