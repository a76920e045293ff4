//! Logging infrastructure for regularized training.
//!
//! Regularizers write scalars through the [`ScalarRecorder`] interface. The
//! main implementation, [`MetricsLogger`], buffers the records of the current
//! step and writes them to one or more [`LoggingBackend`]s on [`MetricsLogger::dump`]:
//! - Console logging (stdout)
//! - File logging (plain text)
//! - JSON lines logging (one object per scalar)

use crate::{TrainError, TrainResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Write-only sink for scalar key/value records.
pub trait ScalarRecorder {
    /// Record `value` under `key` for the current step.
    fn record(&mut self, key: &str, value: f64);
}

/// A recorder shared between the training loop and the components it drives.
pub type SharedRecorder = Rc<RefCell<dyn ScalarRecorder>>;

/// Trait for logging backends.
pub trait LoggingBackend {
    /// Log a scalar metric.
    ///
    /// # Arguments
    /// * `name` - Name of the metric
    /// * `value` - Value of the metric
    /// * `step` - Training step number
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> TrainResult<()>;

    /// Log a text message.
    fn log_text(&mut self, message: &str) -> TrainResult<()>;

    /// Flush any buffered logs.
    fn flush(&mut self) -> TrainResult<()>;
}

/// Console logger that outputs to stdout.
///
/// Timestamps are on unless built with [`ConsoleLogger::without_timestamp`].
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    /// Whether to include timestamps.
    pub include_timestamp: bool,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            include_timestamp: true,
        }
    }
}

impl ConsoleLogger {
    /// Create a new console logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console logger without timestamps.
    pub fn without_timestamp() -> Self {
        Self {
            include_timestamp: false,
        }
    }

    fn format_timestamp(&self) -> String {
        if self.include_timestamp {
            let now = std::time::SystemTime::now();
            match now.duration_since(std::time::UNIX_EPOCH) {
                Ok(duration) => format!("[{:.3}] ", duration.as_secs_f64()),
                Err(_) => String::new(),
            }
        } else {
            String::new()
        }
    }
}

impl LoggingBackend for ConsoleLogger {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> TrainResult<()> {
        println!(
            "{}Step {}: {} = {:.6}",
            self.format_timestamp(),
            step,
            name,
            value
        );
        Ok(())
    }

    fn log_text(&mut self, message: &str) -> TrainResult<()> {
        println!("{}{}", self.format_timestamp(), message);
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        std::io::stdout()
            .flush()
            .map_err(|e| TrainError::LoggingError(format!("Failed to flush stdout: {}", e)))
    }
}

fn open_log_file(path: &Path, truncate: bool) -> TrainResult<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path).map_err(|e| {
        TrainError::LoggingError(format!("Failed to open log file {:?}: {}", path, e))
    })
}

/// File logger that writes human-readable lines to a file.
#[derive(Debug)]
pub struct FileLogger {
    file: File,
    path: PathBuf,
}

impl FileLogger {
    /// Create a new file logger, appending to an existing file.
    pub fn new<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_log_file(&path, false)?;
        Ok(Self { file, path })
    }

    /// Create a new file logger, truncating the file if it exists.
    pub fn new_truncate<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_log_file(&path, true)?;
        Ok(Self { file, path })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LoggingBackend for FileLogger {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> TrainResult<()> {
        writeln!(self.file, "Step {}: {} = {:.6}", step, name, value)
            .map_err(|e| TrainError::LoggingError(format!("Failed to write to log file: {}", e)))
    }

    fn log_text(&mut self, message: &str) -> TrainResult<()> {
        writeln!(self.file, "{}", message)
            .map_err(|e| TrainError::LoggingError(format!("Failed to write to log file: {}", e)))
    }

    fn flush(&mut self) -> TrainResult<()> {
        self.file
            .flush()
            .map_err(|e| TrainError::LoggingError(format!("Failed to flush log file: {}", e)))
    }
}

/// Logger writing one JSON object per line.
///
/// Scalars become `{"step": .., "key": .., "value": ..}`; text messages
/// become `{"message": ..}`. Non-finite values are written as `null`.
#[derive(Debug)]
pub struct JsonlLogger {
    file: File,
    path: PathBuf,
}

impl JsonlLogger {
    /// Create a JSON lines logger, truncating the file if it exists.
    pub fn new<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_log_file(&path, true)?;
        Ok(Self { file, path })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: serde_json::Value) -> TrainResult<()> {
        writeln!(self.file, "{}", line)
            .map_err(|e| TrainError::LoggingError(format!("Failed to write to log file: {}", e)))
    }
}

impl LoggingBackend for JsonlLogger {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> TrainResult<()> {
        self.write_line(serde_json::json!({
            "step": step,
            "key": name,
            "value": value,
        }))
    }

    fn log_text(&mut self, message: &str) -> TrainResult<()> {
        self.write_line(serde_json::json!({ "message": message }))
    }

    fn flush(&mut self) -> TrainResult<()> {
        self.file
            .flush()
            .map_err(|e| TrainError::LoggingError(format!("Failed to flush log file: {}", e)))
    }
}

/// Step-oriented metrics logger.
///
/// [`ScalarRecorder::record`] keeps the latest value per key until the next
/// [`dump`](Self::dump); [`record_mean`](Self::record_mean) collects values
/// that are averaged at dump time. When a key has both, the mean is written
/// and reported by [`last_value`](Self::last_value).
pub struct MetricsLogger {
    backends: Vec<Box<dyn LoggingBackend>>,
    current_step: usize,
    pending: BTreeMap<String, f64>,
    accumulated: BTreeMap<String, Vec<f64>>,
    last_values: HashMap<String, f64>,
}

impl std::fmt::Debug for MetricsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLogger")
            .field("num_backends", &self.backends.len())
            .field("current_step", &self.current_step)
            .field("pending", &self.pending)
            .finish()
    }
}

impl MetricsLogger {
    /// Create a new metrics logger without backends.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            current_step: 0,
            pending: BTreeMap::new(),
            accumulated: BTreeMap::new(),
            last_values: HashMap::new(),
        }
    }

    /// Add a logging backend.
    pub fn add_backend<B: LoggingBackend + 'static>(&mut self, backend: B) {
        self.backends.push(Box::new(backend));
    }

    /// Accumulate a value to be averaged at the next dump.
    pub fn record_mean(&mut self, key: &str, value: f64) {
        self.accumulated
            .entry(key.to_string())
            .or_default()
            .push(value);
    }

    /// Latest value seen for `key`, pending or already dumped.
    ///
    /// A pending value is the one the next dump will write.
    pub fn last_value(&self, key: &str) -> Option<f64> {
        self.accumulated
            .get(key)
            .and_then(|values| mean(values))
            .or_else(|| self.pending.get(key).copied())
            .or_else(|| self.last_values.get(key).copied())
    }

    /// Write all pending values to every backend and advance the step.
    ///
    /// Keys are written in sorted order. If a backend fails, pending values
    /// are kept and the step is not advanced, so the dump can be retried.
    pub fn dump(&mut self) -> TrainResult<()> {
        let mut to_log = self.pending.clone();
        for (key, values) in &self.accumulated {
            if let Some(avg) = mean(values) {
                to_log.insert(key.clone(), avg);
            }
        }

        for (key, value) in &to_log {
            for backend in &mut self.backends {
                backend.log_scalar(key, *value, self.current_step)?;
            }
        }

        self.pending.clear();
        self.accumulated.clear();
        self.last_values.extend(to_log);
        self.current_step += 1;
        Ok(())
    }

    /// Log a text message to all backends.
    pub fn log_message(&mut self, message: &str) -> TrainResult<()> {
        for backend in &mut self.backends {
            backend.log_text(message)?;
        }
        Ok(())
    }

    /// Set the current step.
    pub fn set_step(&mut self, step: usize) {
        self.current_step = step;
    }

    /// Get the current step.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Flush all backends.
    pub fn flush(&mut self) -> TrainResult<()> {
        for backend in &mut self.backends {
            backend.flush()?;
        }
        Ok(())
    }

    /// Get the number of backends.
    pub fn num_backends(&self) -> usize {
        self.backends.len()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

impl Default for MetricsLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarRecorder for MetricsLogger {
    fn record(&mut self, key: &str, value: f64) {
        self.pending.insert(key.to_string(), value);
    }
}

/// Recorder that keeps every record in arrival order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecorder {
    records: Vec<(String, f64)>,
}

impl InMemoryRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[(String, f64)] {
        &self.records
    }

    /// Values recorded under `key`, oldest first.
    pub fn values(&self, key: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Number of records under `key`.
    pub fn count(&self, key: &str) -> usize {
        self.records.iter().filter(|(k, _)| k == key).count()
    }

    /// Most recent value recorded under `key`.
    pub fn last(&self, key: &str) -> Option<f64> {
        self.records
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

impl ScalarRecorder for InMemoryRecorder {
    fn record(&mut self, key: &str, value: f64) {
        self.records.push((key.to_string(), value));
    }
}
