use std::fmt;

/// Semantic category of an emitted record. The wire names are the
/// collectd type names so downstream pipelines keyed on those continue to
/// line up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricType {
    /// Process/thread count for the daemon.
    ProcessCount,
    /// Items currently stored in the cache.
    CacheItemCount,
    /// Open client connections.
    ConnectionCount,
    /// Lifetime command counts, one record per `cmd_*` key.
    CommandCount,
    /// Cache operations: hits, misses, evictions.
    CacheOps,
    /// Used and free cache capacity in bytes.
    SpaceUsage,
    /// User and system CPU time consumed by the daemon.
    ProcessCpuTime,
    /// Octets received and sent by the daemon.
    NetworkOctets,
    /// Derived percentages, e.g. the get hit ratio.
    Percent,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessCount => "ps_count",
            Self::CacheItemCount => "memcached_items",
            Self::ConnectionCount => "memcached_connections",
            Self::CommandCount => "memcached_command",
            Self::CacheOps => "memcached_ops",
            Self::SpaceUsage => "df",
            Self::ProcessCpuTime => "ps_cputime",
            Self::NetworkOctets => "memcached_octets",
            Self::Percent => "percent",
        }
    }
}

/// One or two numeric values. Gauges are instantaneous and use NaN as the
/// "not observed" sentinel; counters are monotonic lifetime values and
/// default to zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Values {
    Gauge(f64),
    GaugePair(f64, f64),
    Counter(u64),
    CounterPair(u64, u64),
}

/// The final output unit of a poll cycle. Constructed by the derivation
/// engine and handed straight to the sink; never stored across cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    metric_type: MetricType,
    type_instance: Option<String>,
    values: Values,
    instance: String,
}

impl MetricRecord {
    pub fn new(
        metric_type: MetricType,
        type_instance: Option<&str>,
        values: Values,
        instance: &str,
    ) -> Self {
        Self {
            metric_type,
            type_instance: type_instance.map(|s| s.to_string()),
            values,
            instance: instance.to_string(),
        }
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn type_instance(&self) -> Option<&str> {
        self.type_instance.as_deref()
    }

    pub fn values(&self) -> Values {
        self.values
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memcached-{}/{}", self.instance, self.metric_type.as_str())?;

        if let Some(type_instance) = &self.type_instance {
            write!(f, "-{type_instance}")?;
        }

        match self.values {
            Values::Gauge(v) => write!(f, " {v}"),
            Values::GaugePair(a, b) => write!(f, " {a} {b}"),
            Values::Counter(v) => write!(f, " {v}"),
            Values::CounterPair(a, b) => write!(f, " {a} {b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_collectd_style_identifier() {
        let record = MetricRecord::new(
            MetricType::CacheItemCount,
            Some("current"),
            Values::Gauge(42.0),
            "local",
        );
        assert_eq!(record.to_string(), "memcached-local/memcached_items-current 42");
    }

    #[test]
    fn renders_pairs_and_bare_types() {
        let record = MetricRecord::new(
            MetricType::NetworkOctets,
            None,
            Values::CounterPair(100, 200),
            "local",
        );
        assert_eq!(record.to_string(), "memcached-local/memcached_octets 100 200");
    }
}
