//! Request/response protocol between the caller and the decode thread.
//!
//! The caller sends a [`Request`] holding its own copy of the archive. The
//! worker decodes it and answers with exactly one [`Reply`] carrying either
//! the entry metadata or an error message. Entries in a reply never carry
//! content handles: those belong to the caller, who resolves them against
//! the archive it kept.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use log::{debug, trace};

use crate::config::WorkerConfig;
use crate::error::{Result, UntarError};
use crate::tar::{FileEntry, Untar};

pub type RequestId = u64;

#[derive(Debug)]
pub struct Request {
    pub id: RequestId,
    pub prefix: Option<String>,
    pub buffer: Vec<u8>,
}

#[derive(Debug)]
pub enum Response {
    /// Decoded entries, `content` left empty
    Files(Vec<FileEntry>),
    /// Decode failure rendered as text
    Error(String),
}

#[derive(Debug)]
pub struct Reply {
    pub id: RequestId,
    pub response: Response,
}

/// Decodes one request on the current thread.
pub fn handle(request: &Request) -> Response {
    match Untar::new(&request.buffer).untar(request.prefix.as_deref()) {
        Ok(files) => Response::Files(files),
        Err(e) => {
            debug!("request {} failed: {e}", request.id);
            Response::Error(e.to_string())
        }
    }
}

/// Entry point of the decode thread: serves requests until the caller hangs
/// up either end of the channel.
pub fn run_worker(requests: Receiver<Request>, replies: Sender<Reply>) {
    debug!("untar worker started");
    for request in requests {
        trace!("request {}: {} bytes", request.id, request.buffer.len());
        let response = handle(&request);
        if replies.send(Reply { id: request.id, response }).is_err() {
            break;
        }
    }
    debug!("untar worker stopped");
}

/// Caller's end of a running decode thread.
///
/// Dropping it hangs up both directions; the thread exits once it finishes
/// whatever request it is working on, and that reply is discarded.
#[derive(Debug)]
pub struct WorkerChannel {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
}

impl WorkerChannel {
    pub fn spawn(config: &WorkerConfig) -> Result<Self> {
        Self::spawn_with(config, run_worker)
    }

    /// Starts a thread running `entry` on the far ends of a fresh channel pair.
    pub(crate) fn spawn_with<F>(config: &WorkerConfig, entry: F) -> Result<Self>
    where
        F: FnOnce(Receiver<Request>, Sender<Reply>) + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(move || entry(request_rx, reply_tx))?;

        Ok(Self {
            requests: request_tx,
            replies: reply_rx,
        })
    }

    pub fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| UntarError::Disconnected)
    }

    /// Next reply if one is ready.
    pub fn try_recv(&self) -> Result<Option<Reply>> {
        match self.replies.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(UntarError::Disconnected),
        }
    }

    /// Blocks until the next reply.
    pub fn recv(&self) -> Result<Reply> {
        self.replies.recv().map_err(|_| UntarError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{pax_record, TarBuilder};

    fn request(id: RequestId, buffer: Vec<u8>) -> Request {
        Request {
            id,
            prefix: None,
            buffer,
        }
    }

    #[test]
    fn handle_returns_metadata_only() {
        let buffer = TarBuilder::new().file("a.txt", b"abc").finish();
        let Response::Files(files) = handle(&request(1, buffer)) else {
            panic!("expected files");
        };
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name.as_deref(), Some("a.txt"));
        assert_eq!((files[0].start, files[0].size), (512, 3));
        assert!(files[0].content.is_none());
    }

    #[test]
    fn handle_applies_prefix() {
        let buffer = TarBuilder::new().file("a.txt", b"abc").finish();
        let mut req = request(1, buffer);
        req.prefix = Some("assets/".to_string());
        let Response::Files(files) = handle(&req) else {
            panic!("expected files");
        };
        assert_eq!(files[0].name.as_deref(), Some("assets/a.txt"));
    }

    #[test]
    fn handle_renders_errors() {
        let buffer = TarBuilder::new()
            .pax_local(b"17path=broken.txt")
            .file("a.txt", b"abc")
            .finish();
        let Response::Error(message) = handle(&request(1, buffer)) else {
            panic!("expected error");
        };
        assert!(message.contains("PAX record"), "{message}");
    }

    #[test]
    fn one_reply_per_request_in_order() {
        let channel = WorkerChannel::spawn(&WorkerConfig::default()).unwrap();
        let good = TarBuilder::new()
            .pax_local(&pax_record("path", "renamed.txt"))
            .file("a.txt", b"abc")
            .finish();
        channel.send(request(7, good)).unwrap();
        channel.send(request(8, vec![b'x'; 10])).unwrap();

        let first = channel.recv().unwrap();
        assert_eq!(first.id, 7);
        assert!(matches!(
            &first.response,
            Response::Files(f) if f[0].name.as_deref() == Some("renamed.txt")
        ));
        let second = channel.recv().unwrap();
        assert_eq!(second.id, 8);
        assert!(matches!(second.response, Response::Error(_)));
        assert!(channel.try_recv().unwrap().is_none());
    }

    #[test]
    fn worker_exits_when_requests_hang_up() {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let worker = thread::spawn(move || run_worker(request_rx, reply_tx));
        request_tx.send(request(1, vec![0u8; 1024])).unwrap();
        drop(request_tx);
        worker.join().unwrap();

        let reply = reply_rx.recv().unwrap();
        assert!(matches!(reply.response, Response::Files(f) if f.is_empty()));
        assert!(reply_rx.recv().is_err());
    }
}
