//! An [`SseSink`] backed by an axum-compatible event stream.
//!
//! An `async_stream::stream!` loop reads off a channel and yields
//! `axum::response::sse::Event`s, ending the stream when the channel closes.
//! The channel carries our own [`SseFrame`]s rather than whole response
//! objects, because fan-out and keep-alive are [`SseFanout`]'s job, not this
//! module's.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::sse::Event;
use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::fanout::{SseFrame, SseSink};

/// A sink that forwards frames into an unbounded channel for an
/// `async_stream`-backed axum SSE response to consume.
pub struct AxumSseSink {
    tx: mpsc::UnboundedSender<Option<SseFrame>>,
}

#[async_trait]
impl SseSink for AxumSseSink {
    async fn write_frame(&self, frame: SseFrame) -> Result<(), ()> {
        self.tx.send(Some(frame)).map_err(|_| ())
    }

    async fn close(&self) {
        let _ = self.tx.send(None);
    }
}

/// Builds a connected `(sink, stream)` pair: register `sink` with
/// [`SseFanout`](crate::fanout::SseFanout), then hand `stream` to
/// `axum::response::sse::Sse::new(stream)` as the response body.
pub fn sse_channel() -> (Arc<AxumSseSink>, impl Stream<Item = Result<Event, Infallible>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = Arc::new(AxumSseSink { tx });
    (sink, render_stream(rx))
}

fn render_stream(
    mut rx: mpsc::UnboundedReceiver<Option<SseFrame>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Some(Some(SseFrame::Data(json))) => {
                    yield Ok(Event::default().data(json));
                }
                Some(Some(SseFrame::KeepAlive)) => {
                    yield Ok(Event::default().comment("keep-alive"));
                }
                Some(None) | None => break,
            }
        }
    }
}
