use super::*;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "11211";

/// One memcached daemon to poll. Immutable after the config is loaded;
/// each poll cycle borrows it.
#[derive(Clone, Deserialize)]
pub struct Instance {
    /// Logical name for this daemon. Must be unique within the config.
    name: String,
    /// Path to the daemon's UNIX socket. Takes precedence over host/port.
    #[serde(default)]
    socket: Option<String>,
    #[serde(default)]
    host: Option<String>,
    /// Port, kept as a string so that an empty value selects the default
    /// port just like an absent one.
    #[serde(default)]
    port: Option<String>,
}

impl Instance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket(&self) -> Option<&str> {
        self.socket.as_deref()
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> &str {
        match self.port.as_deref() {
            Some(port) if !port.is_empty() => port,
            _ => DEFAULT_PORT,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_port_default() {
        let instance: Instance = toml::from_str("name = \"local\"").unwrap();
        assert_eq!(instance.host(), DEFAULT_HOST);
        assert_eq!(instance.port(), DEFAULT_PORT);
        assert_eq!(instance.address(), "127.0.0.1:11211");
        assert!(instance.socket().is_none());
    }

    #[test]
    fn empty_port_string_selects_default() {
        let instance: Instance =
            toml::from_str("name = \"local\"\nhost = \"10.0.0.1\"\nport = \"\"").unwrap();
        assert_eq!(instance.address(), "10.0.0.1:11211");
    }

    #[test]
    fn explicit_port_is_used() {
        let instance: Instance = toml::from_str("name = \"local\"\nport = \"11212\"").unwrap();
        assert_eq!(instance.address(), "127.0.0.1:11212");
    }
}
