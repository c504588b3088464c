//! Structured logging for the bridge.
//!
//! Call sites use the `log` facade. [`install`] registers a [`BridgeLogger`]
//! that renders every record as one JSON object per line:
//!
//! ```text
//! {"ts_ms":1729240000123,"seq":4,"level":"debug","target":"VMLauncher","event":"Done processing args"}
//! ```
//!
//! The sink is any `Write + Send`: a file, stderr, the Android log (provided by
//! the ABI crate) or an in-memory buffer in tests.

use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::kv::{self, Key, Source, Value, VisitSource};
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Parse from string (case-insensitive). Unknown values mean `Info`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "all" => Self::Trace,
            "debug" | "verbose" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            "off" | "none" | "quiet" => Self::Off,
            _ => Self::Info,
        }
    }

    #[must_use]
    pub const fn filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::Trace,
            Self::Debug => LevelFilter::Debug,
            Self::Info => LevelFilter::Info,
            Self::Warn => LevelFilter::Warn,
            Self::Error => LevelFilter::Error,
            Self::Off => LevelFilter::Off,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warn,
            log::Level::Error => Self::Error,
        }
    }
}

/// Canonical structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts_ms: u64,
    pub seq: u64,
    pub level: LogLevel,
    pub target: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Library symbol the event is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    /// Status returned by a runtime or executable entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Loader diagnostic or any other key-value pairs, `key=value` separated by spaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(level: LogLevel, target: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            ts_ms: now_ms(),
            seq: 0,
            level,
            target: target.into(),
            event: event.into(),
            module: None,
            symbol: None,
            errno: None,
            exit_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    /// Append `text` to the details, space separated.
    #[must_use]
    pub fn with_details(mut self, text: impl AsRef<str>) -> Self {
        self.push_details(text.as_ref());
        self
    }

    fn push_details(&mut self, text: &str) {
        match &mut self.details {
            Some(details) => {
                details.push(' ');
                details.push_str(text);
            }
            None => self.details = Some(text.to_string()),
        }
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a sink, numbering them.
pub struct LogEmitter {
    writer: Box<dyn Write + Send>,
    seq: u64,
}

impl LogEmitter {
    /// Create an emitter that appends to a file.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::to_writer(std::io::LineWriter::new(file)))
    }

    /// Create an emitter that writes to stderr.
    #[must_use]
    pub fn to_stderr() -> Self {
        Self::to_writer(std::io::stderr())
    }

    #[must_use]
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            seq: 0,
        }
    }

    /// Stamp `entry` with the next sequence number and write it.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        self.seq += 1;
        entry.seq = self.seq;
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// `log` integration
// ---------------------------------------------------------------------------

/// `log::Log` implementation backed by a [`LogEmitter`].
pub struct BridgeLogger {
    level: LevelFilter,
    emitter: Mutex<LogEmitter>,
}

impl BridgeLogger {
    #[must_use]
    pub fn new(level: LogLevel, emitter: LogEmitter) -> Self {
        Self {
            level: level.filter(),
            emitter: Mutex::new(emitter),
        }
    }
}

impl Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut entry = LogEntry::new(
            record.level().into(),
            record.target(),
            record.args().to_string(),
        );
        if let Some(module) = record.module_path() {
            entry = entry.with_module(module);
        }
        let mut fields = FieldCollector { entry };
        // Collecting is infallible; an error only stops the remaining pairs.
        let _ = record.key_values().visit(&mut fields);
        let entry = fields.entry;
        // Logging is best effort; a broken sink must not fail the caller.
        let _ = self.emitter.lock().emit_entry(entry);
    }

    fn flush(&self) {
        let _ = self.emitter.lock().flush();
    }
}

/// Moves `log` key-value pairs into the entry's optional fields.
///
/// `symbol`, `errno`, `exit_code` and `details` land in their own fields;
/// anything else is appended to `details` as `key=value`.
struct FieldCollector {
    entry: LogEntry,
}

impl<'kvs> VisitSource<'kvs> for FieldCollector {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        let number = value.to_i64().and_then(|v| i32::try_from(v).ok());
        match (key.as_str(), number) {
            ("symbol", _) => self.entry.symbol = Some(value.to_string()),
            ("errno", Some(errno)) => self.entry.errno = Some(errno),
            ("exit_code", Some(code)) => self.entry.exit_code = Some(code),
            ("details", _) => self.entry.push_details(&value.to_string()),
            (other, _) => self.entry.push_details(&format!("{other}={value}")),
        }
        Ok(())
    }
}

/// Register the process-wide logger. Returns `false` if one was already set.
pub fn install(level: LogLevel, emitter: LogEmitter) -> bool {
    let logger: &'static BridgeLogger = Box::leak(Box::new(BridgeLogger::new(level, emitter)));
    match log::set_logger(logger) {
        Ok(()) => {
            log::set_max_level(level.filter());
            true
        }
        Err(_) => false,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    #[test]
    fn loose_level_parsing() {
        assert_eq!(LogLevel::from_str_loose("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_loose(" warning "), LogLevel::Warn);
        assert_eq!(LogLevel::from_str_loose("off"), LogLevel::Off);
        assert_eq!(LogLevel::from_str_loose("bogus"), LogLevel::Info);
        assert_eq!(LogLevel::Off.filter(), LevelFilter::Off);
    }

    #[test]
    fn entry_serializes_required_fields() {
        let entry = LogEntry::new(LogLevel::Error, "VMLauncher", "JLI lib = NULL");
        let parsed: serde_json::Value = serde_json::from_str(&entry.to_jsonl().unwrap()).unwrap();
        assert!(parsed["ts_ms"].is_u64());
        assert_eq!(parsed["level"], "error");
        assert_eq!(parsed["target"], "VMLauncher");
        assert_eq!(parsed["event"], "JLI lib = NULL");
        assert!(parsed.get("module").is_none());
    }

    #[test]
    fn emitter_numbers_lines() {
        let buffer = SharedBuffer::default();
        let mut emitter = LogEmitter::to_writer(buffer.clone());
        emitter
            .emit_entry(LogEntry::new(LogLevel::Debug, "VMLauncher", "Done processing args"))
            .unwrap();
        emitter
            .emit_entry(LogEntry::new(LogLevel::Debug, "VMLauncher", "Free done").with_module("x"))
            .unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["seq"], 1);
        assert_eq!(lines[1]["seq"], 2);
        assert_eq!(lines[1]["module"], "x");
    }

    #[test]
    fn logger_respects_level_filter() {
        let buffer = SharedBuffer::default();
        let logger = BridgeLogger::new(LogLevel::Warn, LogEmitter::to_writer(buffer.clone()));

        logger.log(
            &Record::builder()
                .level(log::Level::Debug)
                .target("jrebridge")
                .args(format_args!("dropped"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(log::Level::Error)
                .target("jrebridge")
                .module_path(Some("jrebridge_abi::loader"))
                .args(format_args!("dlopen libjli.so failed"))
                .build(),
        );

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["event"], "dlopen libjli.so failed");
        assert_eq!(lines[0]["module"], "jrebridge_abi::loader");
    }

    #[test]
    fn logger_lifts_key_values_into_fields() {
        let buffer = SharedBuffer::default();
        let logger = BridgeLogger::new(LogLevel::Debug, LogEmitter::to_writer(buffer.clone()));
        let kvs = [
            ("symbol", kv::Value::from("JLI_Launch")),
            ("exit_code", kv::Value::from(7)),
            ("errno", kv::Value::from(2)),
            ("details", kv::Value::from("libjli.so: cannot open shared object file")),
            ("attempt", kv::Value::from(1)),
        ];

        logger.log(
            &Record::builder()
                .level(log::Level::Debug)
                .target("VMLauncher")
                .key_values(&kvs)
                .args(format_args!("JLI_Launch returned"))
                .build(),
        );

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["symbol"], "JLI_Launch");
        assert_eq!(lines[0]["exit_code"], 7);
        assert_eq!(lines[0]["errno"], 2);
        assert_eq!(
            lines[0]["details"],
            "libjli.so: cannot open shared object file attempt=1"
        );
    }

    #[test]
    fn optional_fields_are_omitted_when_unset() {
        let entry = LogEntry::new(LogLevel::Info, "jrebridge", "dlopen libjvm.so success");
        let json = entry.to_jsonl().unwrap();
        for field in ["symbol", "errno", "exit_code", "details"] {
            assert!(!json.contains(field), "{json}");
        }
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
