use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{event_dispatcher::EventDispatcherConfig, Result};

/// Configuration of the `announcement-bar` server, read from a JSON file.
///
/// Every field has a default, so `{}` is a valid configuration:
///
/// ```
/// # use announcement_bar::ServerConfig;
/// let config: ServerConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(config.listener.port, 3000);
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listener: Listener,
    pub source: ConfigSource,
    pub events: EventsConfig,
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<ServerConfig> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Where bar configuration comes from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ConfigSource {
    /// A snapshot file loaded once at startup.
    File { path: PathBuf },
    /// A snapshot endpoint polled in the background.
    Url {
        url: String,
        #[serde(default = "default_poll_interval_secs")]
        poll_interval_secs: u64,
    },
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for ConfigSource {
    fn default() -> Self {
        ConfigSource::File {
            path: PathBuf::from("bars.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Analytics ingestion endpoint. Events are only logged when unset.
    pub ingestion_url: Option<String>,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub delivery_interval_ms: u64,
    pub delivery_timeout_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig {
            ingestion_url: None,
            queue_capacity: 10_000,
            batch_size: 100,
            delivery_interval_ms: 1_000,
            delivery_timeout_ms: 2_000,
        }
    }
}

impl From<&EventsConfig> for EventDispatcherConfig {
    fn from(config: &EventsConfig) -> Self {
        EventDispatcherConfig {
            ingestion_url: config.ingestion_url.clone(),
            queue_capacity: config.queue_capacity,
            batch_size: config.batch_size,
            delivery_interval: Duration::from_millis(config.delivery_interval_ms),
            delivery_timeout: Duration::from_millis(config.delivery_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use super::{ConfigSource, EventsConfig, ServerConfig};
    use crate::event_dispatcher::EventDispatcherConfig;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(
            config.source,
            ConfigSource::File {
                path: PathBuf::from("bars.json")
            }
        );
        assert_eq!(config.events.ingestion_url, None);
    }

    #[test]
    fn parses_url_source_and_events() {
        let config: ServerConfig = serde_json::from_str(
            r#"
              {
                "listener": { "host": "0.0.0.0", "port": 8080 },
                "source": { "type": "url", "url": "https://config.internal/bars" },
                "events": { "ingestion_url": "https://events.internal/batch", "batch_size": 50 }
              }
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(
            config.source,
            ConfigSource::Url {
                url: "https://config.internal/bars".into(),
                poll_interval_secs: 30,
            }
        );
        assert_eq!(config.events.batch_size, 50);
        assert_eq!(config.events.queue_capacity, 10_000);
    }

    #[test]
    fn converts_to_dispatcher_config() {
        let dispatcher = EventDispatcherConfig::from(&EventsConfig::default());
        assert_eq!(dispatcher.delivery_interval, Duration::from_secs(1));
        assert_eq!(dispatcher.delivery_timeout, Duration::from_secs(2));
        assert_eq!(dispatcher.batch_size, 100);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ServerConfig::from_file("does/not/exist.json"),
            Err(crate::Error::Io(_))
        ));
    }
}
