use crate::config::{Config, Instance};
use crate::record::MetricRecord;
use crate::sink::Sink;
use crate::*;
use chrono::{Timelike, Utc};
use std::fmt;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::time::timeout;

pub mod connect;
pub mod parse;
pub mod query;

use connect::ConnectError;
use query::QueryError;

/// Why a poll cycle produced no records. Fatal for the cycle only; the
/// next scheduled cycle is the retry mechanism.
#[derive(Debug)]
pub enum CycleError {
    Connect(ConnectError),
    Query(QueryError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "{e}"),
            Self::Query(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CycleError {}

/// Launch one polling task per configured instance on a dedicated runtime.
pub fn launch(config: &Config, sink: Arc<dyn Sink>) -> Runtime {
    debug!("launching pollers");

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(std::cmp::max(1, config.instances().len()))
        .build()
        .expect("failed to initialize tokio runtime");

    INSTANCES.add(config.instances().len() as i64);

    for instance in config.instances() {
        runtime.spawn(task(
            instance.clone(),
            config.general().interval(),
            config.general().connect_timeout(),
            sink.clone(),
        ));
    }

    runtime
}

async fn task(
    instance: Instance,
    interval: Duration,
    connect_timeout: Duration,
    sink: Arc<dyn Sink>,
) {
    // get an aligned start time
    let start = tokio::time::Instant::now()
        - Duration::from_nanos(Utc::now().nanosecond() as u64)
        + interval;

    let mut ticker = tokio::time::interval_at(start, interval);

    while RUNNING.load(Ordering::Relaxed) {
        // use a timeout here so we always check RUNNING at least once a second
        if timeout(Duration::from_secs(1), ticker.tick()).await.is_err() {
            continue;
        }

        let start = Instant::now();

        match poll_once(&instance, interval, connect_timeout).await {
            Ok(records) => {
                let stop = Instant::now();
                let latency_ns = stop.duration_since(start).as_nanos() as u64;
                let _ = CYCLE_LATENCY.increment(latency_ns);

                for record in &records {
                    sink.emit(record);
                    RECORDS_EMITTED.increment();
                }
            }
            Err(e) => {
                error!("memcached [{}]: {e}", instance.name());
            }
        }
    }
}

/// One poll cycle: connect, query, parse, derive. Fully sequential; the
/// instance is only borrowed and nothing is shared across cycles.
pub async fn poll_once(
    instance: &Instance,
    interval: Duration,
    connect_timeout: Duration,
) -> Result<Vec<MetricRecord>, CycleError> {
    CONNECT.increment();
    let mut connection = match connect::connect(instance, connect_timeout).await {
        Ok(c) => {
            CONNECT_OK.increment();
            c
        }
        Err(e) => {
            CONNECT_EX.increment();
            return Err(CycleError::Connect(e));
        }
    };

    REQUEST.increment();
    let response = match query::query(&mut connection, interval).await {
        Ok(r) => {
            RESPONSE_OK.increment();
            r
        }
        Err(e) => {
            match e {
                QueryError::ResponseTimeout => RESPONSE_TIMEOUT.increment(),
                _ => RESPONSE_EX.increment(),
            };
            return Err(CycleError::Query(e));
        }
    };

    for warning in response.warnings() {
        match warning {
            query::Warning::Truncated => {
                RESPONSE_TRUNCATED.increment();
                warn!("memcached [{}]: response has been truncated", instance.name());
            }
            query::Warning::ReadTimeout => {
                warn!(
                    "memcached [{}]: read deadline expired; proceeding with partial data",
                    instance.name()
                );
            }
        }
    }

    Ok(parse::parse_and_derive(response.data(), instance))
}
