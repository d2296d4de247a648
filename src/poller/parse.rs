use crate::config::Instance;
use crate::record::{MetricRecord, MetricType, Values};

/// Values remembered while scanning lines and consumed once afterward for
/// the derived records. Gauges start as the NaN "not observed" sentinel so
/// that an observed zero remains distinguishable; counters start at zero.
#[derive(Debug)]
pub struct Accumulator {
    bytes_used: f64,
    bytes_total: f64,
    gets: f64,
    hits: f64,
    rusage_user: u64,
    rusage_system: u64,
    octets_rx: u64,
    octets_tx: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            bytes_used: f64::NAN,
            bytes_total: f64::NAN,
            gets: f64::NAN,
            hits: f64::NAN,
            rusage_user: 0,
            rusage_system: 0,
            octets_rx: 0,
            octets_tx: 0,
        }
    }
}

/// Parses a raw `stats` response and derives the full record set for one
/// cycle. Total: malformed content yields fewer records, never an error.
pub fn parse_and_derive(data: &[u8], instance: &Instance) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    let mut acc = Accumulator::default();

    let text = String::from_utf8_lossy(data);

    for line in text.split(['\r', '\n']) {
        if line.is_empty() {
            continue;
        }
        scan_line(line, instance, &mut acc, &mut records);
    }

    derive(&acc, instance, &mut records);

    records
}

/// Splits off the next whitespace-delimited token.
fn token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return None;
    }
    let end = s
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

fn scan_line(
    line: &str,
    instance: &Instance,
    acc: &mut Accumulator,
    records: &mut Vec<MetricRecord>,
) {
    // lines are `STAT <key> <value>`; the first field is not validated,
    // only the key and value matter
    let Some((_command, rest)) = token(line) else {
        return;
    };
    let Some((key, rest)) = token(rest) else {
        return;
    };

    // anything beyond the third field stays part of the value
    let value = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if value.is_empty() {
        return;
    }

    let name = instance.name();

    match key {
        "rusage_user" => acc.rusage_user = lenient_u64(value),
        "rusage_system" => acc.rusage_system = lenient_u64(value),
        "threads" => records.push(MetricRecord::new(
            MetricType::ProcessCount,
            None,
            Values::GaugePair(f64::NAN, lenient_f64(value)),
            name,
        )),
        "curr_items" => records.push(MetricRecord::new(
            MetricType::CacheItemCount,
            Some("current"),
            Values::Gauge(lenient_f64(value)),
            name,
        )),
        "bytes" => acc.bytes_used = lenient_f64(value),
        "limit_maxbytes" => acc.bytes_total = lenient_f64(value),
        "curr_connections" => records.push(MetricRecord::new(
            MetricType::ConnectionCount,
            Some("current"),
            Values::Gauge(lenient_f64(value)),
            name,
        )),
        "get_hits" => {
            records.push(MetricRecord::new(
                MetricType::CacheOps,
                Some("hits"),
                Values::Counter(lenient_u64(value)),
                name,
            ));
            acc.hits = lenient_f64(value);
        }
        "get_misses" => records.push(MetricRecord::new(
            MetricType::CacheOps,
            Some("misses"),
            Values::Counter(lenient_u64(value)),
            name,
        )),
        "evictions" => records.push(MetricRecord::new(
            MetricType::CacheOps,
            Some("evictions"),
            Values::Counter(lenient_u64(value)),
            name,
        )),
        "bytes_read" => acc.octets_rx = lenient_u64(value),
        "bytes_written" => acc.octets_tx = lenient_u64(value),
        _ => {
            if key.len() > 4 && key.starts_with("cmd_") {
                let command = &key[4..];
                records.push(MetricRecord::new(
                    MetricType::CommandCount,
                    Some(command),
                    Values::Counter(lenient_u64(value)),
                    name,
                ));
                if command == "get" {
                    acc.gets = lenient_f64(value);
                }
            }
        }
    }
}

fn derive(acc: &Accumulator, instance: &Instance, records: &mut Vec<MetricRecord>) {
    let name = instance.name();

    // used and free capacity; suppressed when either side is missing or
    // the daemon reports used > total
    if !acc.bytes_used.is_nan()
        && !acc.bytes_total.is_nan()
        && acc.bytes_used <= acc.bytes_total
    {
        records.push(MetricRecord::new(
            MetricType::SpaceUsage,
            Some("cache"),
            Values::GaugePair(acc.bytes_used, acc.bytes_total - acc.bytes_used),
            name,
        ));
    }

    if acc.rusage_user != 0 || acc.rusage_system != 0 {
        records.push(MetricRecord::new(
            MetricType::ProcessCpuTime,
            None,
            Values::CounterPair(acc.rusage_user, acc.rusage_system),
            name,
        ));
    }

    if acc.octets_rx != 0 || acc.octets_tx != 0 {
        records.push(MetricRecord::new(
            MetricType::NetworkOctets,
            None,
            Values::CounterPair(acc.octets_rx, acc.octets_tx),
            name,
        ));
    }

    if !acc.gets.is_nan() && !acc.hits.is_nan() {
        let ratio = if acc.gets != 0.0 {
            100.0 * acc.hits / acc.gets
        } else {
            f64::NAN
        };

        records.push(MetricRecord::new(
            MetricType::Percent,
            Some("hitratio"),
            Values::Gauge(ratio),
            name,
        ));
    }
}

/// C `atoll` semantics: the longest leading numeric prefix, zero when
/// there is none. Unparseable fields degrade to zero, never an error.
fn lenient_u64(s: &str) -> u64 {
    let mut value = 0;
    for end in s.char_indices().map(|(i, _)| i).skip(1).chain([s.len()]) {
        if let Ok(v) = s[..end].parse::<u64>() {
            value = v;
        }
    }
    value
}

/// C `atof` semantics, same shape as [`lenient_u64`].
fn lenient_f64(s: &str) -> f64 {
    let mut value = 0.0;
    for end in s.char_indices().map(|(i, _)| i).skip(1).chain([s.len()]) {
        if let Ok(v) = s[..end].parse::<f64>() {
            value = v;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        toml::from_str("name = \"test\"").unwrap()
    }

    fn find<'a>(
        records: &'a [MetricRecord],
        metric_type: MetricType,
        type_instance: Option<&str>,
    ) -> Option<&'a MetricRecord> {
        records
            .iter()
            .find(|r| r.metric_type() == metric_type && r.type_instance() == type_instance)
    }

    #[test]
    fn curr_items_gauge_is_exact() {
        let records = parse_and_derive(b"STAT curr_items 12345\r\nEND\r\n", &instance());
        let record = find(&records, MetricType::CacheItemCount, Some("current")).unwrap();
        assert_eq!(record.values(), Values::Gauge(12345.0));
        assert_eq!(record.instance(), "test");
    }

    #[test]
    fn space_usage_values_sum_to_total() {
        let records = parse_and_derive(
            b"STAT bytes 300\r\nSTAT limit_maxbytes 1000\r\nEND\r\n",
            &instance(),
        );
        let record = find(&records, MetricType::SpaceUsage, Some("cache")).unwrap();
        assert_eq!(record.values(), Values::GaugePair(300.0, 700.0));
    }

    #[test]
    fn space_usage_suppressed_when_used_exceeds_total() {
        let records = parse_and_derive(
            b"STAT bytes 2000\r\nSTAT limit_maxbytes 1000\r\nEND\r\n",
            &instance(),
        );
        assert!(find(&records, MetricType::SpaceUsage, Some("cache")).is_none());
    }

    #[test]
    fn space_usage_suppressed_when_either_side_missing() {
        let records = parse_and_derive(b"STAT bytes 300\r\nEND\r\n", &instance());
        assert!(find(&records, MetricType::SpaceUsage, Some("cache")).is_none());
    }

    #[test]
    fn zero_gets_yields_unknown_hit_ratio() {
        let records = parse_and_derive(
            b"STAT cmd_get 0\r\nSTAT get_hits 0\r\nEND\r\n",
            &instance(),
        );
        let record = find(&records, MetricType::Percent, Some("hitratio")).unwrap();
        match record.values() {
            Values::Gauge(v) => assert!(v.is_nan()),
            other => panic!("unexpected values: {other:?}"),
        }
    }

    #[test]
    fn hit_ratio_is_a_percentage() {
        let records = parse_and_derive(
            b"STAT cmd_get 200\r\nSTAT get_hits 50\r\nEND\r\n",
            &instance(),
        );
        let record = find(&records, MetricType::Percent, Some("hitratio")).unwrap();
        assert_eq!(record.values(), Values::Gauge(25.0));
    }

    #[test]
    fn hit_ratio_suppressed_without_both_inputs() {
        let records = parse_and_derive(b"STAT get_hits 50\r\nEND\r\n", &instance());
        assert!(find(&records, MetricType::Percent, Some("hitratio")).is_none());
    }

    #[test]
    fn commands_emit_counters_by_name() {
        let records = parse_and_derive(
            b"STAT cmd_get 7\r\nSTAT cmd_set 3\r\nSTAT cmd_flush 1\r\nEND\r\n",
            &instance(),
        );
        let get = find(&records, MetricType::CommandCount, Some("get")).unwrap();
        assert_eq!(get.values(), Values::Counter(7));
        let set = find(&records, MetricType::CommandCount, Some("set")).unwrap();
        assert_eq!(set.values(), Values::Counter(3));
        assert!(find(&records, MetricType::CommandCount, Some("flush")).is_some());
    }

    #[test]
    fn bare_cmd_prefix_is_ignored() {
        let records = parse_and_derive(b"STAT cmd_ 7\r\nEND\r\n", &instance());
        assert!(records.is_empty());
    }

    #[test]
    fn cpu_and_octet_pairs_emitted_when_nonzero() {
        let records = parse_and_derive(
            b"STAT rusage_user 12\r\nSTAT rusage_system 0\r\n\
              STAT bytes_read 100\r\nSTAT bytes_written 200\r\nEND\r\n",
            &instance(),
        );
        let cpu = find(&records, MetricType::ProcessCpuTime, None).unwrap();
        assert_eq!(cpu.values(), Values::CounterPair(12, 0));
        let octets = find(&records, MetricType::NetworkOctets, None).unwrap();
        assert_eq!(octets.values(), Values::CounterPair(100, 200));
    }

    #[test]
    fn all_zero_pairs_are_suppressed() {
        let records = parse_and_derive(
            b"STAT rusage_user 0\r\nSTAT rusage_system 0\r\nEND\r\n",
            &instance(),
        );
        assert!(find(&records, MetricType::ProcessCpuTime, None).is_none());
    }

    #[test]
    fn threads_use_the_second_gauge_slot() {
        let records = parse_and_derive(b"STAT threads 4\r\nEND\r\n", &instance());
        let record = find(&records, MetricType::ProcessCount, None).unwrap();
        match record.values() {
            Values::GaugePair(first, second) => {
                assert!(first.is_nan());
                assert_eq!(second, 4.0);
            }
            other => panic!("unexpected values: {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_and_malformed_lines_are_dropped() {
        let records = parse_and_derive(
            b"STAT pointer_size 64\r\nSTAT\r\nnonsense\r\nSTAT curr_items\r\n\r\nEND\r\n",
            &instance(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn extra_fields_stay_in_the_value() {
        // the numeric prefix of the retained tail is what gets parsed
        let records = parse_and_derive(b"STAT curr_items 10 trailing\r\nEND\r\n", &instance());
        let record = find(&records, MetricType::CacheItemCount, Some("current")).unwrap();
        assert_eq!(record.values(), Values::Gauge(10.0));
    }

    #[test]
    fn lenient_numeric_parsing() {
        assert_eq!(lenient_u64("123"), 123);
        assert_eq!(lenient_u64("123abc"), 123);
        assert_eq!(lenient_u64("abc"), 0);
        assert_eq!(lenient_u64(""), 0);
        assert_eq!(lenient_f64("1.5"), 1.5);
        assert_eq!(lenient_f64("1.5junk"), 1.5);
        assert_eq!(lenient_f64("2e3"), 2000.0);
        assert_eq!(lenient_f64("bogus"), 0.0);
    }

    #[test]
    fn empty_accumulator_derives_nothing() {
        let mut records = Vec::new();
        derive(&Accumulator::default(), &instance(), &mut records);
        assert!(records.is_empty());
    }

    #[test]
    fn derivation_distinguishes_observed_zero_from_unset() {
        let mut acc = Accumulator::default();
        acc.gets = 0.0;
        acc.hits = 0.0;

        let mut records = Vec::new();
        derive(&acc, &instance(), &mut records);

        // an observed zero still produces the record, with the unknown
        // sentinel as its value
        let record = find(&records, MetricType::Percent, Some("hitratio")).unwrap();
        match record.values() {
            Values::Gauge(v) => assert!(v.is_nan()),
            other => panic!("unexpected values: {other:?}"),
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let data: &[u8] = b"STAT pid 1\r\nSTAT threads 4\r\nSTAT curr_items 10\r\n\
            STAT bytes 300\r\nSTAT limit_maxbytes 1000\r\nSTAT curr_connections 5\r\n\
            STAT cmd_get 200\r\nSTAT cmd_set 100\r\nSTAT get_hits 50\r\nSTAT get_misses 150\r\n\
            STAT evictions 2\r\nSTAT rusage_user 12\r\nSTAT rusage_system 8\r\n\
            STAT bytes_read 1000\r\nSTAT bytes_written 2000\r\nEND\r\n";

        let instance = instance();
        let first = parse_and_derive(data, &instance);
        let second = parse_and_derive(data, &instance);

        // Debug formatting compares NaN sentinels stably
        assert_eq!(format!("{first:?}"), format!("{second:?}"));

        // 8 direct records plus space usage, cpu, octets, and hit ratio
        assert_eq!(first.len(), 12);
    }
}
