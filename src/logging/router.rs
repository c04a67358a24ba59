//! Routes tracing events to per-subsystem file and console sinks.

use chrono::Local;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

type Console = Box<dyn Write + Send>;

/// Output sinks of one subsystem: at most one file and one console.
struct Sinks {
    file: Option<Mutex<File>>,
    file_path: Option<PathBuf>,
    console: Mutex<Console>,
}

impl Sinks {
    fn count(&self) -> usize {
        1 + usize::from(self.file.is_some())
    }

    fn write_line(&self, line: &str) {
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = file.write_all(line.as_bytes());
        }
        let mut console = self.console.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = console.write_all(line.as_bytes());
        let _ = console.flush();
    }
}

/// Registry of subsystem sinks, usable as a [`tracing_subscriber::Layer`].
///
/// An event is routed to subsystem `name` when its target is `name` or starts with
/// `name::`; the longest such name wins. `TRACE` events are dropped. Clones share the same registry.
#[derive(Clone, Default)]
pub struct LogRouter {
    subsystems: Arc<RwLock<HashMap<String, Arc<Sinks>>>>,
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.subsystems.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LogRouter")
            .field("subsystems", &map.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with a dated file under `dir` and a stderr console sink.
    pub fn register(&self, name: &str, dir: &Path) -> SubsystemLogger {
        self.register_with_console(name, dir, Box::new(io::stderr()))
    }

    /// Register `name`, replacing any sinks it already had.
    ///
    /// If the log file cannot be opened the error is reported on stderr and the
    /// subsystem keeps only its console sink.
    pub fn register_with_console(&self, name: &str, dir: &Path, console: Console) -> SubsystemLogger {
        let (file, file_path) = match open_log_file(name, dir) {
            Ok((file, path)) => (Some(Mutex::new(file)), Some(path)),
            Err(e) => {
                eprintln!("Error creating file handler: {}", e);
                (None, None)
            }
        };

        let sinks = Arc::new(Sinks {
            file,
            file_path,
            console: Mutex::new(console),
        });
        self.subsystems
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), sinks);

        SubsystemLogger {
            name: name.to_string(),
            router: self.clone(),
        }
    }

    fn sinks(&self, name: &str) -> Option<Arc<Sinks>> {
        self.subsystems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Subsystem that owns events with this target. Nested names win over their
    /// parents: `svc::inner` events go to `svc::inner`, not `svc`.
    fn route(&self, target: &str) -> Option<(String, Arc<Sinks>)> {
        let map = self.subsystems.read().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .filter(|(name, _)| target_matches(target, name))
            .max_by_key(|(name, _)| name.len())
            .map(|(name, sinks)| (name.clone(), Arc::clone(sinks)))
    }
}

impl<S: Subscriber> Layer<S> for LogRouter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() == Level::TRACE {
            return;
        }
        let Some((name, sinks)) = self.route(metadata.target()) else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        sinks.write_line(&format_line(&name, *metadata.level(), &visitor.finish()));
    }
}

/// Handle to a registered subsystem.
///
/// The handle always reflects the subsystem's current sinks, so handles taken before
/// a re-initialization keep working.
#[derive(Debug, Clone)]
pub struct SubsystemLogger {
    name: String,
    router: LogRouter,
}

impl SubsystemLogger {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the current log file, if the file sink could be opened.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.router.sinks(&self.name)?.file_path.clone()
    }

    /// Number of attached sinks (file and console).
    pub fn sink_count(&self) -> usize {
        self.router.sinks(&self.name).map_or(0, |s| s.count())
    }

    /// Write a record directly, without going through tracing.
    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        if let Some(sinks) = self.router.sinks(&self.name) {
            sinks.write_line(&format_line(&self.name, level, message.as_ref()));
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::DEBUG, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::ERROR, message);
    }
}

fn target_matches(target: &str, name: &str) -> bool {
    target
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// `<dir>/<name>_<YYYYMMDD>.log`
pub fn log_file_path(name: &str, dir: &Path) -> PathBuf {
    dir.join(format!("{}_{}.log", name, Local::now().format("%Y%m%d")))
}

fn open_log_file(name: &str, dir: &Path) -> io::Result<(File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = log_file_path(name, dir);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        _ => "TRACE",
    }
}

/// `timestamp - name - LEVEL - message`, newline terminated.
fn format_line(name: &str, level: Level, message: &str) -> String {
    format!(
        "{} - {} - {} - {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
        name,
        level_name(level),
        message
    )
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        self.message + &self.fields
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
