//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target of stage headers.
pub(super) const STAGE_TARGET: &str = "dotlink::stage";
/// Target of dry-run previews.
pub(super) const DRY_RUN_TARGET: &str = "dotlink::dry_run";

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &tracing::Event<'_>) -> String {
    let mut extractor = MessageExtractor::default();
    event.record(&mut extractor);
    extractor.message
}

/// One plain-text log file line.
fn file_line(level: Level, target: &str, ts: &str, msg: &str) -> String {
    let msg = strip_ansi(msg);
    match (level, target) {
        (Level::INFO, STAGE_TARGET) => format!("[{ts}] ==> {msg}"),
        (Level::INFO, DRY_RUN_TARGET) => format!("[{ts}]     [dry run] {msg}"),
        (Level::ERROR, _) => format!("[{ts}]     [error] {msg}"),
        (Level::WARN, _) => format!("[{ts}]     [warn] {msg}"),
        (Level::DEBUG | Level::TRACE, _) => format!("[{ts}]     [debug] {msg}"),
        _ => format!("[{ts}]     {msg}"),
    }
}

/// One coloured console line (without the trailing newline).
fn console_line(level: Level, target: &str, msg: &str) -> String {
    match level {
        Level::ERROR => format!("\x1b[31mERROR\x1b[0m {msg}"),
        Level::WARN => format!("\x1b[33mWARN\x1b[0m  {msg}"),
        Level::INFO if target == STAGE_TARGET => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
        Level::INFO if target == DRY_RUN_TARGET => format!("  \x1b[33m[DRY RUN]\x1b[0m {msg}"),
        Level::INFO => format!("  {msg}"),
        _ => format!("  \x1b[2m{msg}\x1b[0m"),
    }
}

/// A [`tracing_subscriber::Layer`] that appends all events to the persistent
/// log file with timestamps and ANSI codes stripped.
///
/// Always captures events at `DEBUG` level and above regardless of the
/// console verbosity setting.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open the cache log file for `command`.
    ///
    /// Returns `None` if the cache directory or file is unavailable.
    pub(super) fn new(command: &str) -> Option<Self> {
        Self::create(&log_file_path(command)?, command)
    }

    /// Create `path` (truncating any previous run), write a run header
    /// naming `command`, and return a layer appending to it.
    pub(super) fn create(path: &Path, command: &str) -> Option<Self> {
        let version =
            option_env!("DOTLINK_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "==========================================\n\
             dotlink {version} {command} {}\n\
             ==========================================\n",
            format_utc_datetime(),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let line = file_line(
            *metadata.level(),
            metadata.target(),
            &format_utc_time(),
            &event_message(event),
        );
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] for dotlink console output.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        writeln!(
            writer,
            "{}",
            console_line(*metadata.level(), metadata.target(), &event_message(event))
        )
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout. All events
/// (including `debug`) are also written to
/// `$XDG_CACHE_HOME/dotlink/<command>.log`. Call once at startup.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
