//! Test helpers: engines over the in-memory backend and synthetic body streams.
//!
//! Run from workspace root: `cargo test -p formdrop-engine`.

#![allow(dead_code)]

pub mod fixtures;

use bytes::Bytes;
use formdrop_engine::{Engine, EngineOptions};
use formdrop_storage::MemoryClient;
use futures::stream::{self, BoxStream, StreamExt};
use std::io;
use std::sync::Arc;

pub const BUCKET: &str = "test";

/// Memory backend answering every completion with `mock-etag` / `mock-location`.
pub fn mock_client() -> MemoryClient {
    MemoryClient::new().with_fixed_response("mock-etag", "mock-location")
}

/// Engine over `client` with `bucket` already set.
pub fn engine_with(client: &MemoryClient, options: EngineOptions) -> Engine {
    Engine::new(options.client(Arc::new(client.clone())).bucket(BUCKET))
        .expect("valid engine options")
}

/// Split `data` into `chunk_size` chunks.
pub fn chunked(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
    data.chunks(chunk_size.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}

pub fn body_stream(data: &[u8], chunk_size: usize) -> BoxStream<'static, Result<Bytes, io::Error>> {
    stream::iter(chunked(data, chunk_size).into_iter().map(Ok)).boxed()
}

/// Like `body_stream`, but yields to the scheduler before every chunk.
pub fn interleaved_stream(
    data: &[u8],
    chunk_size: usize,
) -> BoxStream<'static, Result<Bytes, io::Error>> {
    stream::iter(chunked(data, chunk_size))
        .then(|chunk| async move {
            tokio::task::yield_now().await;
            Ok(chunk)
        })
        .boxed()
}

/// Yields `chunks_before_error` chunks of `data`, then a connection reset.
pub fn failing_stream(
    data: &[u8],
    chunk_size: usize,
    chunks_before_error: usize,
) -> BoxStream<'static, Result<Bytes, io::Error>> {
    let chunks: Vec<Result<Bytes, io::Error>> = chunked(data, chunk_size)
        .into_iter()
        .take(chunks_before_error)
        .map(Ok)
        .chain(std::iter::once(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "client disconnected",
        ))))
        .collect();
    stream::iter(chunks).boxed()
}

/// Give spawned tasks (such as a drop-triggered abort) a chance to run.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
