use crate::config::Config;
use backtrace::Backtrace;
use clap::value_parser;
use clap::Command;
use core::sync::atomic::{AtomicBool, Ordering};
use once_cell::sync::Lazy;
use ringlog::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::sync::RwLock;
use tokio::time::sleep;

mod config;
mod metrics;
mod output;
mod poller;
mod record;
mod sink;

use config::*;
use metrics::*;

static RUNNING: AtomicBool = AtomicBool::new(true);

static METRICS_SNAPSHOT: Lazy<Arc<RwLock<MetricsSnapshot>>> =
    Lazy::new(|| Arc::new(RwLock::new(Default::default())));

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        eprintln!("{s}");
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    // parse command line options
    let cli = Command::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "mcstat polls one or more memcached daemons for operational \
            statistics and turns them into normalized metric records.",
        )
        .arg(
            clap::Arg::new("CONFIG")
                .help("Configuration file")
                .value_parser(value_parser!(PathBuf))
                .action(clap::ArgAction::Set)
                .required(true)
                .index(1),
        )
        .get_matches();

    let config: PathBuf = cli.get_one::<PathBuf>("CONFIG").unwrap().to_path_buf();
    let config = Config::new(&config);

    run(config)
}

fn run(config: Config) {
    // configure debug log
    let debug_output: Box<dyn Output> = if let Some(file) = config.debug().log_file() {
        let backup = config
            .debug()
            .log_backup()
            .unwrap_or(format!("{}.old", file));
        Box::new(
            File::new(&file, &backup, config.debug().log_max_size())
                .expect("failed to open debug log file"),
        )
    } else {
        // by default, log to stderr
        Box::new(Stderr::new())
    };

    let level = config.debug().log_level();

    let debug_log = if level <= Level::Info {
        LogBuilder::new().format(ringlog::default_format)
    } else {
        LogBuilder::new()
    }
    .output(debug_output)
    .log_queue_depth(config.debug().log_queue_depth())
    .single_message_size(config.debug().log_single_message_size())
    .build()
    .expect("failed to initialize debug log");

    let mut log = MultiLogBuilder::new()
        .level_filter(config.debug().log_level().to_level_filter())
        .default(debug_log)
        .build()
        .start();

    output!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // initialize async runtime for control plane
    let control_runtime = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()
        .expect("failed to initialize tokio runtime");

    // spawn logging thread
    control_runtime.spawn(async move {
        while RUNNING.load(Ordering::Relaxed) {
            sleep(Duration::from_millis(1)).await;
            let _ = log.flush();
        }
        let _ = log.flush();
    });

    // spawn thread to maintain metrics snapshots
    {
        let interval = config.general().interval();
        control_runtime.spawn(async move {
            while RUNNING.load(Ordering::Relaxed) {
                // acquire a lock and update the snapshots
                {
                    let mut snapshots = METRICS_SNAPSHOT.write().await;
                    snapshots.update();
                }

                // delay until next update
                sleep(interval).await;
            }
        });
    }

    // shut down on ctrl-c
    control_runtime.spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            RUNNING.store(false, Ordering::Relaxed);
        }
    });

    // begin operational summary output
    control_runtime.spawn(output::log(config.clone()));

    let sink = sink::from_config(&config);

    output!(
        "Polling {} memcached instance(s) every {}",
        config.instances().len(),
        humantime::format_duration(config.general().interval()),
    );

    debug!("Starting pollers");
    let poller_runtime = poller::launch(&config, sink);

    while RUNNING.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
    }

    // shutdown thread pools
    poller_runtime.shutdown_timeout(Duration::from_millis(100));

    // delay before exiting so the log drains
    std::thread::sleep(Duration::from_millis(100));
}
