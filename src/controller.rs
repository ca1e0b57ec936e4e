//! Signal wiring and the steady-state ingest loop.

use crate::config;
use crate::http_client::ReqwestTransport;
use crate::log_writer::LogWriter;
use crate::parser::Parser;
use crate::translator::Translator;
use crate::tsdb_client::TimeSeriesClient;
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use spool_source::SpoolCollector;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

const WATCHED_SIGNALS: [Signal; 4] = [Signal::SIGHUP, Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM];

pub struct Controller {
    config_path: PathBuf,
    app_name: String,
}

impl Controller {
    pub fn new(config_path: PathBuf, app_name: impl Into<String>) -> Self {
        Controller {
            config_path,
            app_name: app_name.into(),
        }
    }

    /// Blocks signals, loads configuration, starts the signal waiter, then
    /// drives iterations until a stop signal arrives.
    pub fn run(&self) {
        let watched_mask = watched_signal_set();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&watched_mask), None)
            .expect("blocking signals on the controller thread");

        let (mut runtime, mut log) = config::load(&self.config_path, &self.app_name);

        let reload_requested = Arc::new(AtomicBool::new(false));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Condvar::new());
        let iteration_gate = Arc::new(Mutex::new(()));

        let waiter = {
            let reload_requested = Arc::clone(&reload_requested);
            let stop_requested = Arc::clone(&stop_requested);
            let wake = Arc::clone(&wake);
            thread::Builder::new()
                .name("signal-waiter".to_string())
                .spawn(move || signal_waiter_loop(watched_mask, reload_requested, stop_requested, wake))
                .expect("spawning signal waiter thread")
        };

        loop {
            if reload_requested.swap(false, Ordering::SeqCst) {
                let (new_runtime, new_log) = config::load(&self.config_path, &self.app_name);
                runtime = new_runtime;
                log = new_log;
                tracing::info!("configuration reloaded");
            }

            self.run_iteration(&runtime, &log, &stop_requested);

            if stop_requested.load(Ordering::SeqCst) {
                break;
            }

            let guard = iteration_gate.lock().unwrap();
            let _ = wake
                .wait_timeout_while(guard, runtime.delay, |_| {
                    !reload_requested.load(Ordering::SeqCst) && !stop_requested.load(Ordering::SeqCst)
                })
                .unwrap();
        }

        log.info("stopped");
        let _ = waiter.join();
    }

    fn run_iteration(&self, runtime: &config::RuntimeConfig, log: &LogWriter, stop_requested: &Arc<AtomicBool>) {
        let transport = ReqwestTransport::new();
        let translator = Translator::new(runtime.measurement.clone(), &runtime.unit_map);
        let client = TimeSeriesClient::new(
            transport,
            &runtime.influx_host,
            runtime.influx_port,
            runtime.influx_database.clone(),
            translator,
            log,
        );

        if !client.test_connection() || !client.create_database_if_not_exists() {
            return;
        }

        let mut collector = SpoolCollector::new(&runtime.spool_directory, log);
        let parser = Parser::new(log);

        while !stop_requested.load(Ordering::SeqCst) && collector.has_more() {
            let line = collector.next_line();
            if line.is_empty() {
                continue;
            }
            if let Some(record) = parser.parse(&line) {
                client.transmit_line(&record, &line);
            }
        }
    }
}

fn watched_signal_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in WATCHED_SIGNALS {
        set.add(signal);
    }
    set
}

fn signal_waiter_loop(mask: SigSet, reload_requested: Arc<AtomicBool>, stop_requested: Arc<AtomicBool>, wake: Arc<Condvar>) {
    loop {
        match mask.wait() {
            Ok(Signal::SIGHUP) => {
                reload_requested.store(true, Ordering::SeqCst);
                wake.notify_all();
            }
            Ok(Signal::SIGINT) | Ok(Signal::SIGQUIT) | Ok(Signal::SIGTERM) => {
                stop_requested.store(true, Ordering::SeqCst);
                wake.notify_all();
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!("signal wait failed: {err}");
                return;
            }
        }
    }
}
