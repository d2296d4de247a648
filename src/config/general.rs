use super::*;

fn interval() -> String {
    "10s".into()
}

fn connect_timeout() -> u64 {
    200
}

#[derive(Clone, Deserialize)]
pub struct General {
    /// The collection interval. Each instance is polled once per interval
    /// and the same interval bounds how long a cycle waits for the
    /// daemon's response. Specify time along with unit; defaults to 10s.
    #[serde(default = "interval")]
    interval: String,
    /// Connect timeout in milliseconds, applied to each connect attempt.
    #[serde(default = "connect_timeout")]
    connect_timeout: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            interval: interval(),
            connect_timeout: connect_timeout(),
        }
    }
}

impl General {
    pub fn validate(&self) {
        match self.interval.parse::<humantime::Duration>() {
            Ok(interval) => {
                if interval.as_millis() < Duration::from_secs(1).as_millis() {
                    eprintln!("interval should be at least 1s");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("interval is not valid: {e}");
                std::process::exit(1);
            }
        }

        if self.connect_timeout == 0 {
            eprintln!("connect_timeout must be non-zero");
            std::process::exit(1);
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval.parse::<humantime::Duration>().unwrap().into()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }
}
