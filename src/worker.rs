//! Isolated decode units.
//!
//! A unit takes a [`Request`] carrying raw buffers and a correlation id,
//! runs it to completion and answers with a [`Response`] tagged with the same
//! id. A response without a payload signals failure.

use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::dslog::decode_ds_logs;
use crate::error::{Error, Result};
use crate::export::{export, ExportOptions, ExportOutput};
use crate::log::LogStore;
use crate::models::SerializedLog;
use crate::reader::decode_wpilog;
use crate::rlog::decode_rlog;

#[derive(Debug, Clone)]
pub enum RequestKind {
    DecodeWpilog(Vec<u8>),
    DecodeRlog(Vec<u8>),
    /// Status log and/or event log of one driver station session
    DecodeDriverStation {
        ds_log: Option<Vec<u8>>,
        ds_events: Option<Vec<u8>>,
    },
    Export {
        log: SerializedLog,
        options: ExportOptions,
    },
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: u64,
    pub kind: RequestKind,
}

impl Request {
    pub fn new(id: u64, kind: RequestKind) -> Self {
        Self { id, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Log(SerializedLog),
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    /// `None` if the request failed
    pub payload: Option<ResponsePayload>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}

fn execute(kind: RequestKind) -> Result<ResponsePayload> {
    let log = match kind {
        RequestKind::DecodeWpilog(data) => decode_wpilog(&data)?,
        RequestKind::DecodeRlog(data) => decode_rlog(&data)?,
        RequestKind::DecodeDriverStation { ds_log, ds_events } => {
            decode_ds_logs(ds_log.as_deref(), ds_events.as_deref())?
        }
        RequestKind::Export { log, options } => {
            let log = LogStore::from_serialized(log);
            return Ok(match export(&log, &options)? {
                ExportOutput::Text(text) => ResponsePayload::Text(text),
                ExportOutput::Bytes(bytes) => ResponsePayload::Bytes(bytes),
            });
        }
    };
    Ok(ResponsePayload::Log(log.to_serialized()))
}

/// Runs one request synchronously.
pub fn run_request(request: Request) -> Response {
    let id = request.id;
    match execute(request.kind) {
        Ok(payload) => Response {
            id,
            payload: Some(payload),
        },
        Err(err) => {
            warn!("Request {} failed: {}", id, err);
            Response { id, payload: None }
        }
    }
}

/// Runs one request on the blocking thread pool.
#[cfg(feature = "tokio-runtime")]
pub async fn run_request_async(request: Request) -> Response {
    let id = request.id;
    tokio::task::spawn_blocking(move || run_request(request))
        .await
        .unwrap_or_else(|err| {
            warn!("Request {} did not complete: {}", id, err);
            Response { id, payload: None }
        })
}

/// A decode unit on its own thread, handling one request at a time.
///
/// Responses come back in submission order. Dropping the worker lets the
/// thread finish any queued requests and then joins it.
///
/// # Examples
///
/// ```
/// use robolog::worker::{DecodeWorker, Request, RequestKind};
///
/// let worker = DecodeWorker::spawn()?;
/// worker.submit(Request::new(7, RequestKind::DecodeRlog(vec![1, 0])))?;
/// let response = worker.recv()?;
/// assert_eq!(response.id, 7);
/// assert!(response.is_success());
/// # Ok::<(), robolog::Error>(())
/// ```
pub struct DecodeWorker {
    requests: Option<Sender<Request>>,
    responses: Receiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    pub fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (response_tx, response_rx) = mpsc::channel::<Response>();

        let thread = thread::Builder::new()
            .name("robolog-worker".to_string())
            .spawn(move || {
                for request in request_rx {
                    debug!("Worker handling request {}", request.id);
                    if response_tx.send(run_request(request)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            thread: Some(thread),
        })
    }

    pub fn submit(&self, request: Request) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or_else(|| Error::Other("Worker stopped".to_string()))?
            .send(request)
            .map_err(|_| Error::Other("Worker stopped".to_string()))
    }

    /// Blocks until the next response arrives.
    pub fn recv(&self) -> Result<Response> {
        self.responses
            .recv()
            .map_err(|_| Error::Other("Worker stopped".to_string()))
    }

    pub fn try_recv(&self) -> Option<Response> {
        self.responses.try_recv().ok()
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportFormat;

    #[test]
    fn test_failed_request_has_no_payload() {
        let response = run_request(Request::new(3, RequestKind::DecodeWpilog(b"nope".to_vec())));
        assert_eq!(response.id, 3);
        assert!(!response.is_success());
    }

    #[test]
    fn test_export_request() {
        let mut log = LogStore::new();
        log.put_number("/x", 1.0, 2.0);
        let response = run_request(Request::new(
            1,
            RequestKind::Export {
                log: log.to_serialized(),
                options: ExportOptions::new(ExportFormat::CsvList),
            },
        ));
        assert_eq!(
            response.payload,
            Some(ResponsePayload::Text("Timestamp,Key,Value\n1,/x,2".to_string()))
        );
    }

    #[test]
    fn test_worker_answers_in_order() {
        let worker = DecodeWorker::spawn().unwrap();
        worker
            .submit(Request::new(1, RequestKind::DecodeRlog(vec![9, 0])))
            .unwrap();
        worker
            .submit(Request::new(
                2,
                RequestKind::DecodeDriverStation {
                    ds_log: None,
                    ds_events: None,
                },
            ))
            .unwrap();

        let first = worker.recv().unwrap();
        let second = worker.recv().unwrap();
        assert_eq!((first.id, first.is_success()), (1, false));
        assert_eq!((second.id, second.is_success()), (2, true));
    }
}
