//! Offloaded decoding.
//!
//! [`UntarWorker`] owns a decode thread and the requests in flight on it.
//! Submitting never blocks on the decode. Completion callbacks run on the
//! thread that owns the `UntarWorker`, from [`UntarWorker::poll`] or
//! [`UntarWorker::wait`], and that is also where content handles are
//! created: the worker only sends back offsets.
//!
//! ```rust
//! use untar_light::{UntarWorker, WorkerConfig};
//!
//! let mut worker = UntarWorker::new(WorkerConfig::new().prefix("assets/")).unwrap();
//! worker
//!     .submit(vec![0u8; 1024], |result| {
//!         let files = result.unwrap();
//!         println!("{} files", files.len());
//!     })
//!     .unwrap();
//! worker.wait();
//! assert!(!worker.has_pending_requests());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::channel::{Reply, Request, RequestId, Response, WorkerChannel};
use crate::config::WorkerConfig;
use crate::content::Resolution;
use crate::error::{Result, UntarError};
use crate::tar::FileEntry;

type Callback = Box<dyn FnOnce(Result<Vec<FileEntry>>)>;

struct Pending {
    archive: Arc<[u8]>,
    callback: Callback,
}

pub struct UntarWorker {
    config: WorkerConfig,
    channel: Option<WorkerChannel>,
    pending: HashMap<RequestId, Pending>,
    next_id: RequestId,
}

impl UntarWorker {
    /// Starts the decode thread.
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let channel = WorkerChannel::spawn(&config)?;
        Ok(Self {
            config,
            channel: Some(channel),
            pending: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Queues `archive` for decoding with the configured prefix.
    ///
    /// `callback` receives the entries, content resolved, once the reply is
    /// dispatched by [`poll`](Self::poll) or [`wait`](Self::wait).
    pub fn submit<F>(&mut self, archive: impl Into<Arc<[u8]>>, callback: F) -> Result<RequestId>
    where
        F: FnOnce(Result<Vec<FileEntry>>) + 'static,
    {
        let prefix = self.config.prefix.clone();
        self.submit_with_prefix(archive, prefix.as_deref(), callback)
    }

    /// Like [`submit`](Self::submit) with an explicit prefix for this request.
    pub fn submit_with_prefix<F>(
        &mut self,
        archive: impl Into<Arc<[u8]>>,
        prefix: Option<&str>,
        callback: F,
    ) -> Result<RequestId>
    where
        F: FnOnce(Result<Vec<FileEntry>>) + 'static,
    {
        let channel = self.channel.as_ref().ok_or(UntarError::Disconnected)?;
        let archive = archive.into();
        let id = self.next_id;

        // the worker gets a copy; `archive` stays here for content resolution
        channel.send(Request {
            id,
            prefix: prefix.map(str::to_string),
            buffer: archive.to_vec(),
        })?;

        self.next_id += 1;
        self.pending.insert(
            id,
            Pending {
                archive,
                callback: Box::new(callback),
            },
        );
        debug!("submitted request {id} ({} pending)", self.pending.len());
        Ok(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Dispatches every reply that has already arrived, without blocking.
    /// Returns the number of callbacks run.
    pub fn poll(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            let Some(channel) = &self.channel else {
                return dispatched;
            };
            match channel.try_recv() {
                Ok(Some(reply)) => {
                    if self.dispatch(reply) {
                        dispatched += 1;
                    }
                }
                Ok(None) => return dispatched,
                Err(_) => return dispatched + self.fail_pending(),
            }
        }
    }

    /// Blocks until every submitted request has been answered and its
    /// callback run.
    pub fn wait(&mut self) {
        while self.has_pending_requests() {
            let Some(channel) = &self.channel else {
                return;
            };
            match channel.recv() {
                Ok(reply) => {
                    self.dispatch(reply);
                }
                Err(_) => {
                    self.fail_pending();
                }
            }
        }
    }

    /// Stops the decode thread. Requests still in flight are dropped and
    /// their callbacks never run.
    pub fn destroy(&mut self) {
        if self.channel.take().is_some() {
            if !self.pending.is_empty() {
                warn!("abandoning {} untar requests", self.pending.len());
            }
            self.pending.clear();
            debug!("untar worker destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.channel.is_none()
    }

    fn dispatch(&mut self, reply: Reply) -> bool {
        let Some(Pending { archive, callback }) = self.pending.remove(&reply.id) else {
            warn!("reply for unknown request {}", reply.id);
            return false;
        };
        match reply.response {
            Response::Files(mut files) => {
                Resolution::Immediate.apply(&archive, &mut files);
                callback(Ok(files));
            }
            Response::Error(message) => callback(Err(UntarError::Worker(message))),
        }
        true
    }

    /// The thread died without being destroyed: report it to every waiter.
    fn fail_pending(&mut self) -> usize {
        self.channel = None;
        let failed = self.pending.len();
        if failed > 0 {
            warn!("untar worker disconnected with {failed} requests pending");
        }
        for (_, pending) in self.pending.drain() {
            (pending.callback)(Err(UntarError::Disconnected));
        }
        failed
    }
}

impl Drop for UntarWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for UntarWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UntarWorker")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
