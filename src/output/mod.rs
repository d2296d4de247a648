use crate::*;
use chrono::{Timelike, Utc};
use tokio::time::timeout;

#[macro_export]
macro_rules! output {
    () => {
        let now = chrono::Utc::now();
        println!("{}", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false));
    };
    ($($arg:tt)*) => {{
        let now = chrono::Utc::now();
        println!("{} {}", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false), format_args!($($arg)*));
    }};
}

/// Periodically prints an operational summary of the poller itself.
pub async fn log(config: Config) {
    let mut window_id = 0;

    // get an aligned start time
    let start = tokio::time::Instant::now()
        - Duration::from_nanos(Utc::now().nanosecond() as u64)
        + config.general().interval();

    let mut interval = tokio::time::interval_at(start, config.general().interval());

    while RUNNING.load(Ordering::Relaxed) {
        // use a timeout here so we always check RUNNING at least once a second
        if timeout(Duration::from_secs(1), interval.tick())
            .await
            .is_err()
        {
            continue;
        }

        let snapshot = METRICS_SNAPSHOT.read().await;

        output!("-----");
        output!("Window: {window_id}");

        poller_stats(&snapshot);

        window_id += 1;
    }
}

/// Outputs poller stats for the last window
fn poller_stats(snapshot: &MetricsSnapshot) {
    let connect_total = snapshot.counter_rate(CONNECT_COUNTER);
    let connect_ok = snapshot.counter_rate(CONNECT_OK_COUNTER);
    let connect_ex = snapshot.counter_rate(CONNECT_EX_COUNTER);

    let response_ok = snapshot.counter_rate(RESPONSE_OK_COUNTER);
    let response_ex = snapshot.counter_rate(RESPONSE_EX_COUNTER);
    let response_timeout = snapshot.counter_rate(RESPONSE_TIMEOUT_COUNTER);
    let response_truncated = snapshot.counter_rate(RESPONSE_TRUNCATED_COUNTER);

    let records = snapshot.counter_rate(RECORDS_EMITTED_COUNTER);

    let connect_sr = 100.0 * connect_ok / connect_total;

    output!(
        "Poller Connection Rates (/s): Attempt: {:.2} Opened: {:.2} Errors: {:.2} Success Rate: {:.2} %",
        connect_total,
        connect_ok,
        connect_ex,
        connect_sr,
    );

    let response_total = response_ok + response_ex + response_timeout;

    let response_sr = 100.0 * response_ok / response_total;

    output!(
        "Poller Response Rates (/s): Ok: {:.2} Error: {:.2} Timeout: {:.2} Truncated: {:.2} Success Rate: {:.2} %",
        response_ok,
        response_ex,
        response_timeout,
        response_truncated,
        response_sr,
    );

    output!("Records Emitted (/s): {:.2}", records);

    let cycle_latency = snapshot.percentiles(CYCLE_LATENCY_HISTOGRAM);

    let mut latencies = "Poll Cycle Latency (us):".to_owned();

    for (label, _percentile, nanoseconds) in cycle_latency {
        let microseconds = nanoseconds / 1000;
        latencies.push_str(&format!(" {label}: {microseconds}"))
    }

    output!("{latencies}");
}
