//! In-process object storage
//!
//! Implements the full multipart lifecycle against a shared in-memory map. Besides
//! serving as a backend for local runs it is the storage double for tests: responses
//! can be pinned, failures injected per key, and writes held behind a semaphore to
//! exercise backpressure.

use crate::traits::{
    CompletedUpload, ObjectClient, StorageError, StorageResult, UploadHandle, UploadRequest,
    UploadTicket,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Aborted uploads remembered for inspection; older entries are dropped first.
const ABORT_LOG_LIMIT: usize = 256;

/// An object committed by a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    /// Attributes the upload was opened with
    pub request: UploadRequest,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
struct FailurePlan {
    only_key: Option<String>,
    initiate: bool,
    writes_after: Option<usize>,
    complete: bool,
    abort: bool,
    delete: bool,
}

impl FailurePlan {
    fn applies_to(&self, key: &str) -> bool {
        self.only_key.as_deref().map_or(true, |k| k == key)
    }
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    in_flight: HashMap<String, UploadTicket>,
    aborted: VecDeque<UploadTicket>,
    chunks_written: usize,
}

/// In-memory object client
#[derive(Clone)]
pub struct MemoryClient {
    state: Arc<Mutex<State>>,
    base_url: String,
    fixed_etag: Option<String>,
    fixed_location: Option<String>,
    failures: FailurePlan,
    write_gate: Option<Arc<Semaphore>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            base_url: "memory://".to_string(),
            fixed_etag: None,
            fixed_location: None,
            failures: FailurePlan::default(),
            write_gate: None,
        }
    }

    /// Base URL used to build object locations (`{base_url}{bucket}/{key}`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Answer every completion with the same ETag and location.
    pub fn with_fixed_response(
        mut self,
        etag: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.fixed_etag = Some(etag.into());
        self.fixed_location = Some(location.into());
        self
    }

    /// Every write waits for a permit from `gate` before it is accepted.
    pub fn with_write_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.write_gate = Some(gate);
        self
    }

    /// Restrict injected failures to uploads of `key`.
    pub fn failing_only_key(mut self, key: impl Into<String>) -> Self {
        self.failures.only_key = Some(key.into());
        self
    }

    pub fn fail_initiate(mut self) -> Self {
        self.failures.initiate = true;
        self
    }

    /// Reject writes once an upload has accepted `chunks` chunks.
    pub fn fail_writes_after(mut self, chunks: usize) -> Self {
        self.failures.writes_after = Some(chunks);
        self
    }

    pub fn fail_complete(mut self) -> Self {
        self.failures.complete = true;
        self
    }

    pub fn fail_abort(mut self) -> Self {
        self.failures.abort = true;
        self
    }

    pub fn fail_delete(mut self) -> Self {
        self.failures.delete = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object directly, bypassing the upload protocol.
    pub fn insert_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let data = data.into();
        let object = StoredObject {
            etag: etag_for(&data),
            data,
            request: UploadRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                ..UploadRequest::default()
            },
        };
        self.state()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    /// The most recent aborted uploads, oldest first.
    pub fn aborted_uploads(&self) -> Vec<UploadTicket> {
        self.state().aborted.iter().cloned().collect()
    }

    /// Total number of chunks accepted across all uploads.
    pub fn chunks_written(&self) -> usize {
        self.state().chunks_written
    }

    fn location_for(&self, bucket: &str, key: &str) -> String {
        match self.fixed_location {
            Some(ref location) => location.clone(),
            None => format!("{}{}/{}", self.base_url, bucket, key),
        }
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn etag_for(data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    format!("\"{}\"", &digest[..32])
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn create_upload(&self, request: &UploadRequest) -> StorageResult<Box<dyn UploadHandle>> {
        if self.failures.initiate && self.failures.applies_to(&request.key) {
            return Err(StorageError::InitiateFailed(format!(
                "injected initiate failure for {}",
                request.key
            )));
        }

        let ticket = UploadTicket {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            upload_id: Uuid::new_v4().simple().to_string(),
        };
        self.state()
            .in_flight
            .insert(ticket.upload_id.clone(), ticket.clone());

        tracing::debug!(
            bucket = %request.bucket,
            key = %request.key,
            upload_id = %ticket.upload_id,
            "Memory upload created"
        );

        Ok(Box::new(MemoryUploadHandle {
            client: self.clone(),
            ticket,
            request: request.clone(),
            buffer: BytesMut::new(),
            chunks: 0,
            closed: false,
        }))
    }

    async fn abort_upload(&self, ticket: &UploadTicket) -> StorageResult<()> {
        if self.failures.abort && self.failures.applies_to(&ticket.key) {
            return Err(StorageError::AbortFailed(format!(
                "injected abort failure for {}",
                ticket.key
            )));
        }

        let mut state = self.state();
        match state.in_flight.remove(&ticket.upload_id) {
            Some(ticket) => {
                if state.aborted.len() == ABORT_LOG_LIMIT {
                    state.aborted.pop_front();
                }
                state.aborted.push_back(ticket);
                Ok(())
            }
            None => Err(StorageError::NotFound(ticket.upload_id.clone())),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        if self.failures.delete && self.failures.applies_to(key) {
            return Err(StorageError::DeleteFailed(format!(
                "injected delete failure for {}",
                key
            )));
        }

        self.state()
            .objects
            .remove(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        tracing::info!(bucket = %bucket, key = %key, "Memory delete successful");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

struct MemoryUploadHandle {
    client: MemoryClient,
    ticket: UploadTicket,
    request: UploadRequest,
    buffer: BytesMut,
    chunks: usize,
    closed: bool,
}

impl MemoryUploadHandle {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed || !self.client.state().in_flight.contains_key(&self.ticket.upload_id) {
            return Err(StorageError::UploadClosed(self.ticket.upload_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadHandle for MemoryUploadHandle {
    fn ticket(&self) -> &UploadTicket {
        &self.ticket
    }

    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        if let Some(ref gate) = self.client.write_gate {
            gate.acquire()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?
                .forget();
        }

        self.ensure_open()?;

        let failures = &self.client.failures;
        if let Some(limit) = failures.writes_after {
            if failures.applies_to(&self.ticket.key) && self.chunks >= limit {
                return Err(StorageError::PartFailed {
                    part_number: (self.chunks + 1) as i32,
                    message: format!("injected write failure for {}", self.ticket.key),
                });
            }
        }

        self.buffer.extend_from_slice(&chunk);
        self.chunks += 1;
        self.client.state().chunks_written += 1;
        Ok(())
    }

    async fn complete(&mut self) -> StorageResult<CompletedUpload> {
        self.ensure_open()?;

        if self.client.failures.complete && self.client.failures.applies_to(&self.ticket.key) {
            return Err(StorageError::CompleteFailed(format!(
                "injected complete failure for {}",
                self.ticket.key
            )));
        }

        let data = self.buffer.split().freeze();
        let etag = match self.client.fixed_etag {
            Some(ref etag) => etag.clone(),
            None => etag_for(&data),
        };
        let location = self
            .client
            .location_for(&self.ticket.bucket, &self.ticket.key);
        let size = data.len();

        {
            let mut state = self.client.state();
            state.in_flight.remove(&self.ticket.upload_id);
            state.objects.insert(
                (self.ticket.bucket.clone(), self.ticket.key.clone()),
                StoredObject {
                    data,
                    request: self.request.clone(),
                    etag: etag.clone(),
                },
            );
        }
        self.closed = true;

        tracing::info!(
            bucket = %self.ticket.bucket,
            key = %self.ticket.key,
            size_bytes = size,
            "Memory upload successful"
        );

        Ok(CompletedUpload {
            etag: Some(etag),
            location,
            version_id: None,
        })
    }

    async fn abort(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.buffer.clear();
        self.client.abort_upload(&self.ticket).await?;
        self.closed = true;
        Ok(())
    }
}
