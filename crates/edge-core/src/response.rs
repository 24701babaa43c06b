//! Mutable response adapter with an `Open -> Sent -> Materialized` lifecycle.
//!
//! [`ResponseAdapter::new`] hands out two halves. The adapter is what the
//! rendering engine writes to; the [`PendingResponse`] is held by the
//! orchestrator and turned into a platform response once the adapter has
//! been sent.

use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use http::StatusCode;
use tokio::sync::watch;

use crate::{lock, BodyError, BodySink, HeaderStore, IntoHeaderValues, ResponseBody};

/// Response adapter errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response already sent")]
    AlreadySent,
    #[error("Response adapter dropped before it was sent")]
    DroppedBeforeSend,
    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),
    #[error("Failed to build response: {0}")]
    Build(String),
}

/// Header capability of a response.
pub trait HeaderAccess {
    fn set_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<(), ResponseError>;
    fn append_header(&self, name: &str, values: impl IntoHeaderValues)
        -> Result<(), ResponseError>;
    fn has_header(&self, name: &str) -> bool;
    fn get_header(&self, name: &str) -> Option<String>;
    fn get_header_values(&self, name: &str) -> Vec<String>;
    fn remove_header(&self, name: &str) -> Result<(), ResponseError>;
}

/// Status capability of a response.
pub trait StatusHolder {
    fn status(&self) -> StatusCode;
    fn set_status(&self, status: u16) -> Result<(), ResponseError>;
}

/// Body capability of a response.
pub trait BodyWriter {
    /// Append bytes to the buffered body.
    fn write(&self, chunk: impl Into<Bytes>) -> Result<(), ResponseError>;
    /// Replace the buffered body.
    fn body(&self, bytes: impl Into<Bytes>) -> Result<(), ResponseError>;
    /// Mark the body as explicitly absent.
    fn empty_body(&self) -> Result<(), ResponseError>;
    /// Switch to streaming and return the writable end.
    fn body_writer(&self) -> Result<BodySink, ResponseError>;
}

enum BodyState {
    Unset,
    Buffered(BytesMut),
    Empty,
    Stream(Option<BoxStream<'static, Result<Bytes, BodyError>>>),
}

struct State {
    status: StatusCode,
    headers: HeaderStore,
    body: BodyState,
    override_response: Option<http::Response<ResponseBody>>,
    compress: bool,
    sent: bool,
}

/// Writable half of a response.
pub struct ResponseAdapter {
    state: Arc<Mutex<State>>,
    sent_tx: watch::Sender<bool>,
}

/// Read half of a response, resolved once the adapter is sent.
pub struct PendingResponse {
    state: Arc<Mutex<State>>,
    sent_rx: watch::Receiver<bool>,
}

/// Platform response plus the compression request made by the handler.
#[derive(Debug)]
pub struct Materialized {
    pub response: http::Response<ResponseBody>,
    /// Handler asked for the body to be compressed.
    pub compress: bool,
}

impl ResponseAdapter {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (ResponseAdapter, PendingResponse) {
        let state = Arc::new(Mutex::new(State {
            status: StatusCode::OK,
            headers: HeaderStore::new(),
            body: BodyState::Unset,
            override_response: None,
            compress: false,
            sent: false,
        }));
        let (sent_tx, sent_rx) = watch::channel(false);
        (
            ResponseAdapter {
                state: state.clone(),
                sent_tx,
            },
            PendingResponse { state, sent_rx },
        )
    }

    /// Transition `Open -> Sent`. Returns `false` when already sent.
    pub fn send(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.sent {
                return false;
            }
            state.sent = true;
        }
        self.sent_tx.send_replace(true);
        true
    }

    pub fn is_sent(&self) -> bool {
        lock(&self.state).sent
    }

    /// Set the body and send.
    pub fn end(&self, bytes: impl Into<Bytes>) -> Result<(), ResponseError> {
        self.body(bytes)?;
        self.send();
        Ok(())
    }

    /// Replace the whole response. Accepted in any state until materialized
    /// and takes precedence over status, headers and body.
    pub fn set_override(&self, response: http::Response<ResponseBody>) {
        lock(&self.state).override_response = Some(response);
    }

    pub fn has_override(&self) -> bool {
        lock(&self.state).override_response.is_some()
    }

    /// Use an existing stream as the body. The stream is driven by whoever
    /// consumes the materialized response.
    pub fn pipe(
        &self,
        stream: BoxStream<'static, Result<Bytes, BodyError>>,
    ) -> Result<(), ResponseError> {
        self.open_state()?.body = BodyState::Stream(Some(stream));
        Ok(())
    }

    /// Ask the orchestrator to compress the body when the client accepts it.
    pub fn set_compress(&self, compress: bool) {
        lock(&self.state).compress = compress;
    }

    /// Snapshot of the headers staged so far.
    pub fn headers(&self) -> HeaderStore {
        lock(&self.state).headers.clone()
    }

    fn open_state(&self) -> Result<std::sync::MutexGuard<'_, State>, ResponseError> {
        let state = lock(&self.state);
        if state.sent {
            return Err(ResponseError::AlreadySent);
        }
        Ok(state)
    }
}

impl std::fmt::Debug for ResponseAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ResponseAdapter")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("sent", &state.sent)
            .finish()
    }
}

impl HeaderAccess for ResponseAdapter {
    fn set_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<(), ResponseError> {
        self.open_state()?.headers.set(name, values);
        Ok(())
    }

    fn append_header(
        &self,
        name: &str,
        values: impl IntoHeaderValues,
    ) -> Result<(), ResponseError> {
        self.open_state()?.headers.append(name, values);
        Ok(())
    }

    fn has_header(&self, name: &str) -> bool {
        lock(&self.state).headers.contains(name)
    }

    fn get_header(&self, name: &str) -> Option<String> {
        lock(&self.state).headers.get(name)
    }

    fn get_header_values(&self, name: &str) -> Vec<String> {
        lock(&self.state).headers.get_all(name).to_vec()
    }

    fn remove_header(&self, name: &str) -> Result<(), ResponseError> {
        self.open_state()?.headers.remove(name);
        Ok(())
    }
}

impl StatusHolder for ResponseAdapter {
    fn status(&self) -> StatusCode {
        lock(&self.state).status
    }

    fn set_status(&self, status: u16) -> Result<(), ResponseError> {
        let code = StatusCode::from_u16(status).map_err(|_| ResponseError::InvalidStatus(status))?;
        self.open_state()?.status = code;
        Ok(())
    }
}

impl BodyWriter for ResponseAdapter {
    fn write(&self, chunk: impl Into<Bytes>) -> Result<(), ResponseError> {
        let chunk = chunk.into();
        let mut state = self.open_state()?;
        match &mut state.body {
            BodyState::Buffered(buf) => buf.extend_from_slice(&chunk),
            other => *other = BodyState::Buffered(BytesMut::from(&chunk[..])),
        }
        Ok(())
    }

    fn body(&self, bytes: impl Into<Bytes>) -> Result<(), ResponseError> {
        let bytes = bytes.into();
        self.open_state()?.body = BodyState::Buffered(BytesMut::from(&bytes[..]));
        Ok(())
    }

    fn empty_body(&self) -> Result<(), ResponseError> {
        self.open_state()?.body = BodyState::Empty;
        Ok(())
    }

    fn body_writer(&self) -> Result<BodySink, ResponseError> {
        let mut state = self.open_state()?;
        let (sink, stream) = BodySink::channel();
        state.body = BodyState::Stream(Some(stream));
        Ok(sink)
    }
}

impl PendingResponse {
    /// Wait for the adapter to be sent and build the platform response.
    ///
    /// Consumes the pending half, so a response can be materialized once.
    pub async fn materialize(mut self) -> Result<Materialized, ResponseError> {
        if !*self.sent_rx.borrow() && self.sent_rx.wait_for(|sent| *sent).await.is_err() {
            // The sender is gone; the adapter may still have been sent
            // right before it was dropped.
            if !lock(&self.state).sent {
                return Err(ResponseError::DroppedBeforeSend);
            }
        }

        let mut state = lock(&self.state);
        let compress = state.compress;
        if let Some(response) = state.override_response.take() {
            return Ok(Materialized { response, compress });
        }

        let body = match std::mem::replace(&mut state.body, BodyState::Empty) {
            BodyState::Unset => ResponseBody::Full(Bytes::new()),
            BodyState::Buffered(buf) => ResponseBody::Full(buf.freeze()),
            BodyState::Empty => ResponseBody::Empty,
            BodyState::Stream(stream) => match stream {
                Some(stream) => ResponseBody::Stream(stream),
                None => ResponseBody::Empty,
            },
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers.to_header_map();
        Ok(Materialized { response, compress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Send semantics ===

    #[tokio::test]
    async fn test_send_twice_is_harmless() {
        let (res, pending) = ResponseAdapter::new();
        res.set_status(201).unwrap();
        res.body("created").unwrap();
        assert!(res.send());
        assert!(!res.send());

        let out = pending.materialize().await.unwrap().response;
        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(&out.into_body().collect().await.unwrap()[..], b"created");
    }

    #[tokio::test]
    async fn test_writes_after_send_rejected() {
        let (res, _pending) = ResponseAdapter::new();
        res.send();
        assert_eq!(res.write("late"), Err(ResponseError::AlreadySent));
        assert_eq!(res.set_header("X-Late", "1"), Err(ResponseError::AlreadySent));
        assert_eq!(res.set_status(500), Err(ResponseError::AlreadySent));
    }

    #[tokio::test]
    async fn test_dropped_before_send() {
        let (res, pending) = ResponseAdapter::new();
        drop(res);
        assert_eq!(
            pending.materialize().await.unwrap_err(),
            ResponseError::DroppedBeforeSend
        );
    }

    #[tokio::test]
    async fn test_sent_then_dropped_still_materializes() {
        let (res, pending) = ResponseAdapter::new();
        res.end("ok").unwrap();
        drop(res);
        assert!(pending.materialize().await.is_ok());
    }

    // === Override ===

    #[tokio::test]
    async fn test_override_after_send_wins() {
        let (res, pending) = ResponseAdapter::new();
        res.body("buffered").unwrap();
        res.send();
        res.set_override(
            http::Response::builder()
                .status(304)
                .body(ResponseBody::Empty)
                .unwrap(),
        );
        let out = pending.materialize().await.unwrap().response;
        assert_eq!(out.status(), StatusCode::NOT_MODIFIED);
        assert!(out.body().is_empty());
    }

    // === Headers ===

    #[tokio::test]
    async fn test_set_cookie_list_survives_materialize() {
        let (res, pending) = ResponseAdapter::new();
        res.set_header("Set-Cookie", ["a=1", "b=2"]).unwrap();
        res.append_header("Set-Cookie", "c=3").unwrap();
        assert_eq!(res.get_header_values("set-cookie").len(), 3);
        res.send();

        let out = pending.materialize().await.unwrap().response;
        let cookies: Vec<_> = out.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_header_access() {
        let (res, _pending) = ResponseAdapter::new();
        res.set_header("Content-Type", "text/plain").unwrap();
        assert!(res.has_header("content-type"));
        assert_eq!(res.get_header("CONTENT-TYPE").as_deref(), Some("text/plain"));
        res.remove_header("content-type").unwrap();
        assert!(!res.has_header("Content-Type"));
    }

    // === Body ===

    #[tokio::test]
    async fn test_explicit_empty_body_is_null() {
        let (res, pending) = ResponseAdapter::new();
        res.write("discard me").unwrap();
        res.empty_body().unwrap();
        res.send();
        let out = pending.materialize().await.unwrap().response;
        assert!(matches!(out.body(), ResponseBody::Empty));
    }

    #[tokio::test]
    async fn test_streamed_body() {
        let (res, pending) = ResponseAdapter::new();
        let sink = res.body_writer().unwrap();
        res.send();
        sink.write("<html>").unwrap();
        sink.write("</html>").unwrap();
        sink.end();
        let out = pending.materialize().await.unwrap().response;
        assert_eq!(&out.into_body().collect().await.unwrap()[..], b"<html></html>");
    }

    #[tokio::test]
    async fn test_piped_body() {
        use futures::StreamExt;
        let (res, pending) = ResponseAdapter::new();
        let chunks = futures::stream::iter(vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))]);
        res.pipe(chunks.boxed()).unwrap();
        res.send();
        assert_eq!(res.pipe(futures::stream::empty().boxed()), Err(ResponseError::AlreadySent));
        let out = pending.materialize().await.unwrap().response;
        assert_eq!(&out.into_body().collect().await.unwrap()[..], b"ab");
    }

    #[tokio::test]
    async fn test_materialize_waits_for_send() {
        let (res, pending) = ResponseAdapter::new();
        let waiter = pending.materialize();
        let sender = async {
            tokio::task::yield_now().await;
            res.set_compress(true);
            res.end("late").unwrap();
        };
        let (out, ()) = tokio::join!(waiter, sender);
        let out = out.unwrap();
        assert!(out.compress);
        assert_eq!(&out.response.into_body().collect().await.unwrap()[..], b"late");
    }

    #[test]
    fn test_invalid_status() {
        let (res, _pending) = ResponseAdapter::new();
        assert_eq!(res.set_status(42), Err(ResponseError::InvalidStatus(42)));
    }
}
