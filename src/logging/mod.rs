//! Structured logging module using tracing
//!
//! Console output on stderr plus an optional append-only log file. The
//! verbosity count from the command line wins over any environment filter so
//! `-v` flags behave predictably.

use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with console and optional file output.
///
/// Verbosity 0 logs errors only; -v adds warnings and info, -vv debug,
/// -vvv trace.
pub fn init_tracing(verbosity: u8, log_file_path: Option<PathBuf>) {
    let filter_level = match verbosity {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::new(filter_level);

    let registry = tracing_subscriber::registry().with(filter);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if let Some(log_path) = log_file_path {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        if let Some(file) = file {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(false); // no ANSI in files

            registry.with(console_layer).with(file_layer).init();
        } else {
            // Fall back to console only if the file can't be opened
            registry.with(console_layer).init();
        }
    } else {
        registry.with(console_layer).init();
    }
}
