//! Rate-limited byte sink
//!
//! Wraps any [`ByteSink`] with the two-bucket wait discipline: every chunk
//! waits on the per-connection bucket first, then the global bucket, then
//! lands in the sink. Chunks larger than the connection burst are written in
//! burst-sized slices so neither bucket is ever asked for more tokens than
//! it can hold. A failed slice reports the bytes that actually made it out.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stratus_core::domain::Tier;

use crate::bucket::TokenBucket;
use crate::plan::{adjusted_rate, base_rate_for_length, connection_plan};
use crate::WriteError;

/// Destination of rate-limited bytes
#[async_trait::async_trait]
pub trait ByteSink: Send {
    async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()>;
}

/// Collects chunks in memory; used by tests and the ZIP assembler.
#[async_trait::async_trait]
impl ByteSink for Vec<u8> {
    async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}

/// Feeds a response-body channel; a dropped receiver means the client went
/// away and surfaces as `BrokenPipe`.
#[async_trait::async_trait]
impl ByteSink for mpsc::Sender<Bytes> {
    async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.send(chunk)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "response closed"))
    }
}

/// Writer applying per-connection and global rate limits to a sink
pub struct RateLimitedWriter<S> {
    sink: S,
    conn_limiter: TokenBucket,
    global_limiter: Arc<TokenBucket>,
    cancel: CancellationToken,
    /// Bytes this stream will carry (range length, not object size)
    transfer_len: u64,
    written: u64,
    started: Instant,
    /// Tier-scaled base rate the dynamic curve works from
    base_rate: u64,
}

impl<S: ByteSink> RateLimitedWriter<S> {
    /// Builds a writer for a transfer of `transfer_len` bytes.
    ///
    /// The connection bucket starts at the plain length-derived rate; the
    /// tier-scaled target only takes over through the dynamic curve once the
    /// first settling second has passed. The global bucket is shared across
    /// all live streams.
    pub fn new(
        sink: S,
        global_limiter: Arc<TokenBucket>,
        transfer_len: u64,
        tier: Tier,
        cancel: CancellationToken,
    ) -> Self {
        let plan = connection_plan(transfer_len, tier);
        Self {
            sink,
            conn_limiter: TokenBucket::new(base_rate_for_length(transfer_len), plan.burst),
            global_limiter,
            cancel,
            transfer_len,
            written: 0,
            started: Instant::now(),
            base_rate: plan.rate,
        }
    }

    /// Writes `data` through both limiters.
    ///
    /// On success returns `data.len()`. When a wait is cancelled or the sink
    /// fails mid-slice the error is returned and the bytes that did make it
    /// out stay counted in [`RateLimitedWriter::bytes_written`].
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        self.adjust_rate_if_needed();

        let burst = self.conn_limiter.burst() as usize;
        let mut total = 0usize;

        while total < data.len() {
            let end = (total + burst).min(data.len());
            let slice = &data[total..end];
            let n = slice.len() as u64;

            if let Err(e) = self.conn_limiter.wait_n(n, &self.cancel).await {
                return self.partial(total, e);
            }
            if let Err(e) = self.global_limiter.wait_n(n, &self.cancel).await {
                return self.partial(total, e);
            }

            if let Err(e) = self.sink.write_chunk(Bytes::copy_from_slice(slice)).await {
                return self.partial(total, WriteError::Io(e));
            }

            total = end;
            self.written += n;
        }

        Ok(total)
    }

    /// `self.written` already counts every completed slice; this only logs
    /// and forwards the error.
    fn partial(&self, written: usize, err: WriteError) -> Result<usize, WriteError> {
        if written > 0 {
            tracing::debug!(
                written,
                error = %err,
                "rate-limited write ended mid-slice"
            );
        }
        Err(err)
    }

    /// Retargets the connection rate from download progress.
    ///
    /// Skipped during the first second while throughput settles; afterwards
    /// a new rate is applied only when it moves more than 10% from the
    /// current one, which keeps the limiter from thrashing around the
    /// progress thresholds.
    fn adjust_rate_if_needed(&mut self) {
        if self.transfer_len == 0 {
            return;
        }
        if self.started.elapsed().as_secs_f64() < 1.0 {
            return;
        }

        let progress = self.written as f64 / self.transfer_len as f64;
        let target = adjusted_rate(self.base_rate, progress);
        let current = self.conn_limiter.rate();
        if current == 0 {
            return;
        }

        let drift = (target as f64 - current as f64).abs() / current as f64;
        if drift > 0.1 {
            tracing::debug!(current, target, progress, "retargeting connection rate");
            self.conn_limiter.set_rate(target);
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    #[cfg(test)]
    fn with_limiters(
        sink: S,
        conn_limiter: TokenBucket,
        global_limiter: Arc<TokenBucket>,
        transfer_len: u64,
        base_rate: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink,
            conn_limiter,
            global_limiter,
            cancel,
            transfer_len,
            written: 0,
            started: Instant::now(),
            base_rate,
        }
    }
}
