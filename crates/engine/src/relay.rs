//! Streaming relay between the backend's live run output and the caller.
//!
//! [`RelayStream`] is a pull adapter: a chunk is requested from the backend
//! only when the caller's side polls for the next one, so the caller's
//! consumption rate back-pressures the backend connection and nothing is
//! buffered in between. Dropping the relay drops the backend stream, which
//! releases its connection.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, error, info, trace};

use blockrun_api::{BackendError, RunStream};
use blockrun_util::redact_sensitive;

/// Counters over what has been forwarded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub chunks: u64,
    pub bytes: u64,
}

#[derive(Debug)]
enum RelayState {
    Open,
    Completed,
    /// Holds the failure until the poll after the one that observed it.
    Faulted(Option<BackendError>),
}

/// Forwards backend chunks unchanged and in order.
///
/// A mid-stream backend failure is logged and surfaced as the final item, one
/// poll after it was observed so the chunks already handed out get written
/// first. No completion marker or error document is injected into the byte
/// stream.
pub struct RelayStream {
    inner: RunStream,
    app: String,
    stats: RelayStats,
    state: RelayState,
    shutdown: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl RelayStream {
    pub fn new(inner: RunStream, app: impl Into<String>) -> Self {
        Self {
            inner,
            app: app.into(),
            stats: RelayStats::default(),
            state: RelayState::Open,
            shutdown: None,
        }
    }

    /// Close the relay abnormally once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(Box::pin(token.cancelled_owned()));
        self
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    fn fault(&mut self, err: BackendError, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, BackendError>>> {
        self.state = RelayState::Faulted(Some(err));
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, BackendError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match &mut this.state {
            RelayState::Open => {}
            RelayState::Completed => return Poll::Ready(None),
            RelayState::Faulted(pending) => return Poll::Ready(pending.take().map(Err)),
        }

        if let Some(shutdown) = this.shutdown.as_mut()
            && shutdown.as_mut().poll(cx).is_ready()
        {
            info!(
                target: "blockrun::relay",
                app = %this.app,
                chunks = this.stats.chunks,
                bytes = this.stats.bytes,
                "server shutting down; closing relay"
            );
            return this.fault(BackendError::stream("relay closed by server shutdown"), cx);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.stats.chunks += 1;
                this.stats.bytes += chunk.len() as u64;
                trace!(target: "blockrun::relay", app = %this.app, len = chunk.len(), "forwarding chunk");
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                error!(
                    target: "blockrun::relay",
                    app = %this.app,
                    chunks = this.stats.chunks,
                    bytes = this.stats.bytes,
                    code = err.code(),
                    error = %redact_sensitive(&err.to_string()),
                    "backend stream broke; closing caller connection"
                );
                this.fault(err, cx)
            }
            Poll::Ready(None) => {
                this.state = RelayState::Completed;
                debug!(
                    target: "blockrun::relay",
                    app = %this.app,
                    chunks = this.stats.chunks,
                    bytes = this.stats.bytes,
                    "backend stream closed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if matches!(self.state, RelayState::Open) {
            info!(
                target: "blockrun::relay",
                app = %self.app,
                chunks = self.stats.chunks,
                bytes = self.stats.bytes,
                "caller went away; releasing backend stream"
            );
        }
    }
}

impl fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream")
            .field("app", &self.app)
            .field("stats", &self.stats)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::{FutureExt, stream};
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, BackendError>> {
        parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))).collect()
    }

    #[tokio::test]
    async fn forwards_every_chunk_in_order() {
        let parts = ["data: 1\n\n", "data: 2\n\n", "data: 3\n\n"];
        let mut relay = RelayStream::new(stream::iter(chunks(&parts)).boxed(), "a1");

        let mut forwarded = Vec::new();
        while let Some(chunk) = relay.next().await {
            forwarded.push(chunk.unwrap());
        }

        assert_eq!(forwarded.concat(), parts.concat().as_bytes());
        assert_eq!(relay.stats(), RelayStats { chunks: 3, bytes: 27 });
    }

    #[tokio::test]
    async fn fault_after_n_chunks_ends_the_relay() {
        let mut items = chunks(&["one", "two"]);
        items.push(Err(BackendError::stream("connection reset")));
        items.extend(chunks(&["never"]));
        let mut relay = RelayStream::new(stream::iter(items).boxed(), "a1");

        assert_eq!(relay.next().await.unwrap().unwrap(), "one");
        assert_eq!(relay.next().await.unwrap().unwrap(), "two");
        // The poll that observes the fault yields nothing so the prefix can be flushed.
        assert!(relay.next().now_or_never().is_none());
        assert!(matches!(relay.next().await, Some(Err(BackendError::Stream { .. }))));
        assert!(relay.next().await.is_none());
        assert_eq!(relay.stats().chunks, 2);
    }

    #[tokio::test]
    async fn pulls_only_when_polled() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let source = stream::iter(0..100).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, BackendError>(Bytes::from(format!("{i};")))
        });
        let mut relay = RelayStream::new(source.boxed(), "a1");

        relay.next().await.unwrap().unwrap();
        relay.next().await.unwrap().unwrap();
        drop(relay);

        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_an_open_relay() {
        let token = CancellationToken::new();
        let source = stream::iter(chunks(&["first"])).chain(stream::pending());
        let mut relay = RelayStream::new(source.boxed(), "a1").with_shutdown(token.clone());

        assert_eq!(relay.next().await.unwrap().unwrap(), "first");
        assert!(relay.next().now_or_never().is_none());

        token.cancel();
        assert!(matches!(relay.next().await, Some(Err(BackendError::Stream { .. }))));
        assert!(relay.next().await.is_none());
    }
}
