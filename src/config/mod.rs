use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

mod debug;
mod general;
mod instance;
mod sink;

pub use debug::Debug;
pub use general::General;
pub use instance::Instance;
pub use sink::Sink;

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    general: General,
    #[serde(default)]
    debug: Debug,
    #[serde(default)]
    sink: Sink,
    #[serde(rename = "instance", default)]
    instances: Vec<Instance>,
}

impl Config {
    pub fn new(filename: &Path) -> Self {
        let mut file = match std::fs::File::open(filename) {
            Ok(c) => c,
            Err(error) => {
                eprintln!("error loading config file: {}\n{error}", filename.display());
                std::process::exit(1);
            }
        };
        let mut content = String::new();
        match file.read_to_string(&mut content) {
            Ok(_) => {}
            Err(error) => {
                eprintln!("error reading config file: {}\n{error}", filename.display());
                std::process::exit(1);
            }
        }
        let config: Config = match toml::from_str(&content) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("failed to parse TOML config: {}\n{error}", filename.display());
                std::process::exit(1);
            }
        };

        config.validate();

        config
    }

    fn validate(&self) {
        self.general.validate();

        if self.instances.is_empty() {
            eprintln!("config has no [[instance]] sections");
            std::process::exit(1);
        }

        let mut names = HashSet::new();
        for instance in &self.instances {
            if instance.name().is_empty() {
                eprintln!("instance name may not be empty");
                std::process::exit(1);
            }

            if !names.insert(instance.name()) {
                eprintln!("duplicate instance name: {}", instance.name());
                std::process::exit(1);
            }
        }
    }

    pub fn general(&self) -> &General {
        &self.general
    }

    pub fn debug(&self) -> &Debug {
        &self.debug
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            [general]
            interval = "15s"
            connect_timeout = 500

            [sink]
            file = "/tmp/mcstat.out"

            [[instance]]
            name = "local"

            [[instance]]
            name = "remote"
            host = "cache.example.com"
            port = "11212"

            [[instance]]
            name = "socket"
            socket = "/var/run/memcached.sock"
            "#,
        )
        .unwrap();
        config.validate();

        assert_eq!(config.general().interval(), Duration::from_secs(15));
        assert_eq!(config.general().connect_timeout(), Duration::from_millis(500));
        assert_eq!(config.sink().file(), Some("/tmp/mcstat.out"));
        assert_eq!(config.instances().len(), 3);
        assert_eq!(config.instances()[1].address(), "cache.example.com:11212");
        assert_eq!(
            config.instances()[2].socket(),
            Some("/var/run/memcached.sock")
        );
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config: Config = toml::from_str(
            r#"
            [[instance]]
            name = "local"
            "#,
        )
        .unwrap();
        config.validate();

        assert_eq!(config.general().interval(), Duration::from_secs(10));
        assert!(config.sink().file().is_none());
        assert_eq!(config.instances()[0].address(), "127.0.0.1:11211");
    }
}
