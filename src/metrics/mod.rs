use ahash::HashMap;
use ahash::HashMapExt;
use metriken::Lazy;
use paste::paste;
use std::time::SystemTime;

pub static PERCENTILES: &[(&str, f64)] = &[
    ("p50", 50.0),
    ("p90", 90.0),
    ("p99", 99.0),
    ("p999", 99.9),
];

pub struct MetricsSnapshot {
    pub current: SystemTime,
    pub previous: SystemTime,
    pub counters: CountersSnapshot,
    pub histograms: HistogramsSnapshot,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSnapshot {
    pub fn new() -> Self {
        let now = SystemTime::now();

        Self {
            current: now,
            previous: now,
            counters: Default::default(),
            histograms: Default::default(),
        }
    }

    pub fn update(&mut self) {
        self.previous = self.current;
        self.current = SystemTime::now();

        self.counters.update();
        self.histograms.update();
    }

    pub fn percentiles(&self, name: &str) -> Vec<(String, f64, u64)> {
        self.histograms.percentiles(name)
    }

    pub fn counter_rate(&self, name: &str) -> f64 {
        self.counter_delta(name) as f64
            / (self.current.duration_since(self.previous).unwrap()).as_secs_f64()
    }

    pub fn counter_delta(&self, name: &str) -> u64 {
        let current = self.counters.current.get(name);

        if current.is_none() {
            return 0;
        }

        let previous = self.counters.previous.get(name).unwrap_or(&0);

        current.unwrap() - previous
    }
}

pub struct HistogramsSnapshot {
    pub previous: HashMap<String, metriken::histogram::Snapshot>,
    pub deltas: HashMap<String, metriken::histogram::Snapshot>,
}

impl Default for HistogramsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl HistogramsSnapshot {
    pub fn new() -> Self {
        let mut current = HashMap::new();

        for metric in metriken::metrics().iter() {
            let any = if let Some(any) = metric.as_any() {
                any
            } else {
                continue;
            };

            if let Some(histogram) = any.downcast_ref::<metriken::AtomicHistogram>() {
                if let Some(snapshot) = histogram.snapshot() {
                    current.insert(metric.name().to_string(), snapshot);
                }
            }
        }

        let deltas = current.clone();

        Self {
            previous: current,
            deltas,
        }
    }

    pub fn update(&mut self) {
        for metric in metriken::metrics().iter() {
            let any = if let Some(any) = metric.as_any() {
                any
            } else {
                continue;
            };

            if let Some(histogram) = any.downcast_ref::<metriken::AtomicHistogram>() {
                let metric = metric.name().to_string();

                if let Some(snapshot) = histogram.snapshot() {
                    if let Some(previous) = self.previous.get(&metric) {
                        self.deltas
                            .insert(metric.clone(), snapshot.wrapping_sub(previous).unwrap());
                    }

                    self.previous.insert(metric, snapshot);
                }
            }
        }
    }

    pub fn percentiles(&self, metric: &str) -> Vec<(String, f64, u64)> {
        let mut result = Vec::new();

        let percentiles: Vec<f64> = PERCENTILES
            .iter()
            .map(|(_, percentile)| *percentile)
            .collect();

        if let Some(snapshot) = self.deltas.get(metric) {
            if let Ok(percentiles) = snapshot.percentiles(&percentiles) {
                for ((label, _), (percentile, bucket)) in PERCENTILES.iter().zip(percentiles.iter())
                {
                    result.push((label.to_string(), *percentile, bucket.end()));
                }
            }
        }

        result
    }
}

#[derive(Clone)]
pub struct CountersSnapshot {
    pub current: HashMap<String, u64>,
    pub previous: HashMap<String, u64>,
}

impl Default for CountersSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl CountersSnapshot {
    pub fn new() -> Self {
        let mut current = HashMap::new();
        let previous = HashMap::new();

        for metric in metriken::metrics().iter() {
            let any = if let Some(any) = metric.as_any() {
                any
            } else {
                continue;
            };

            let metric = metric.name().to_string();

            if let Some(_counter) = any.downcast_ref::<metriken::Counter>() {
                current.insert(metric.clone(), 0);
            }
        }
        Self { current, previous }
    }

    pub fn update(&mut self) {
        for metric in metriken::metrics().iter() {
            let any = if let Some(any) = metric.as_any() {
                any
            } else {
                continue;
            };

            if let Some(counter) = any.downcast_ref::<metriken::Counter>() {
                if let Some(old_value) = self
                    .current
                    .insert(metric.name().to_string(), counter.value())
                {
                    self.previous.insert(metric.name().to_string(), old_value);
                }
            }
        }
    }
}

#[macro_export]
#[rustfmt::skip]
macro_rules! counter {
    ($ident:ident, $name:tt) => {
        #[metriken::metric(
            name = $name,
            crate = metriken
        )]
        pub static $ident: Lazy<metriken::Counter> =
            metriken::Lazy::new(|| metriken::Counter::new());
        paste! {
            #[allow(dead_code)]
            pub static [<$ident _COUNTER>]: &'static str = $name;
        }
    };
    ($ident:ident, $name:tt, $description:tt) => {
        #[metriken::metric(
            name = $name,
            description = $description,
            crate = metriken
        )]
        pub static $ident: Lazy<metriken::Counter> =
            metriken::Lazy::new(|| metriken::Counter::new());
        paste! {
            #[allow(dead_code)]
            pub static [<$ident _COUNTER>]: &'static str = $name;
        }
    };
}

#[macro_export]
#[rustfmt::skip]
macro_rules! gauge {
    ($ident:ident, $name:tt) => {
        #[metriken::metric(
            name = $name,
            crate = metriken
        )]
        pub static $ident: Lazy<metriken::Gauge> = metriken::Lazy::new(|| metriken::Gauge::new());
        paste! {
            #[allow(dead_code)]
            pub static [<$ident _GAUGE>]: &'static str = $name;
        }
    };
    ($ident:ident, $name:tt, $description:tt) => {
        #[metriken::metric(
            name = $name,
            description = $description,
            crate = metriken
        )]
        pub static $ident: Lazy<metriken::Gauge> = metriken::Lazy::new(|| metriken::Gauge::new());
        paste! {
            #[allow(dead_code)]
            pub static [<$ident _GAUGE>]: &'static str = $name;
        }
    };
}

#[macro_export]
#[rustfmt::skip]
macro_rules! histogram {
    ($ident:ident, $name:tt, $description:tt) => {
        #[metriken::metric(
            name = $name,
            description = $description,
            crate = metriken
        )]
        pub static $ident: metriken::AtomicHistogram = metriken::AtomicHistogram::new(
            7,
            64,
        );
        paste! {
            #[allow(dead_code)]
            pub static [<$ident _HISTOGRAM>]: &'static str = $name;
        }
    };
}

histogram!(
    CYCLE_LATENCY,
    "cycle_latency",
    "distribution of poll cycle latencies in nanoseconds."
);

gauge!(INSTANCES, "poller/instances", "number of configured instances");

counter!(CONNECT, "poller/connect/total");
counter!(CONNECT_OK, "poller/connect/ok");
counter!(CONNECT_EX, "poller/connect/exception");

counter!(REQUEST, "poller/request/total", "stats requests sent");

counter!(
    RESPONSE_OK,
    "poller/response/ok",
    "responses which were parsed and dispatched"
);
counter!(
    RESPONSE_EX,
    "poller/response/exception",
    "responses which encountered some exception while reading"
);
counter!(
    RESPONSE_TIMEOUT,
    "poller/response/timeout",
    "responses not received due to timeout"
);
counter!(
    RESPONSE_TRUNCATED,
    "poller/response/truncated",
    "responses that overran the read buffer and were truncated"
);

counter!(
    RECORDS_EMITTED,
    "poller/records/emitted",
    "metric records handed to the sink"
);
