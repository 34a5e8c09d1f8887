//! Worker configuration.

/// Default name of the decode thread
pub const DEFAULT_THREAD_NAME: &str = "untar-worker";

/// Settings for an [`UntarWorker`](crate::worker::UntarWorker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name given to the worker thread
    pub thread_name: String,
    /// Prepended to every decoded file name, usually an asset directory
    pub prefix: Option<String>,
    /// Worker thread stack size; the platform default when `None`
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            prefix: None,
            stack_size: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}
