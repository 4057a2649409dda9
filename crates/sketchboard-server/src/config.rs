//! Server configuration.

use std::net::SocketAddr;

use crate::error::ConfigError;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;
/// Room a connection lands in when it does not name one.
pub const DEFAULT_ROOM: &str = "main";
/// Live events buffered per receiver before the oldest are dropped.
pub const DEFAULT_LIVE_CAPACITY: usize = 256;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Room used by `/ws` without a `room` query parameter
    pub default_room: String,
    /// Capacity of each room's live cursor channel
    pub live_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            default_room: DEFAULT_ROOM.to_string(),
            live_capacity: DEFAULT_LIVE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// `SKETCHBOARD_ADDR` takes precedence over `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse("PORT", &port)?;
            config.bind_addr.set_port(port);
        }
        if let Some(addr) = lookup("SKETCHBOARD_ADDR") {
            config.bind_addr = parse("SKETCHBOARD_ADDR", &addr)?;
        }
        if let Some(room) = lookup("SKETCHBOARD_ROOM") {
            let room = room.trim();
            if room.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "SKETCHBOARD_ROOM",
                    value: room.to_string(),
                });
            }
            config.default_room = room.to_string();
        }
        if let Some(capacity) = lookup("SKETCHBOARD_LIVE_CAPACITY") {
            let capacity: usize = parse("SKETCHBOARD_LIVE_CAPACITY", &capacity)?;
            if capacity == 0 {
                return Err(ConfigError::Zero {
                    key: "SKETCHBOARD_LIVE_CAPACITY",
                });
            }
            config.live_capacity = capacity;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.default_room, "main");
        assert_eq!(config.live_capacity, DEFAULT_LIVE_CAPACITY);
    }

    #[test]
    fn test_port_and_addr() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);

        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("SKETCHBOARD_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("PORT", "http")])),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("SKETCHBOARD_LIVE_CAPACITY", "0")])),
            Err(ConfigError::Zero { .. })
        ));
        assert!(ServerConfig::from_lookup(lookup(&[("SKETCHBOARD_ROOM", "  ")])).is_err());
    }

    #[test]
    fn test_room_and_capacity() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SKETCHBOARD_ROOM", "lobby"),
            ("SKETCHBOARD_LIVE_CAPACITY", "32"),
        ]))
        .unwrap();
        assert_eq!(config.default_room, "lobby");
        assert_eq!(config.live_capacity, 32);
    }
}
