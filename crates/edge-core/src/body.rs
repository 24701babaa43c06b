//! Response bodies and the streaming sink.

use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

/// Errors raised while producing or consuming a body.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("Body stream closed by reader")]
    Closed,
    #[error("Body stream failed: {0}")]
    Stream(String),
}

/// Body of a materialized response.
pub enum ResponseBody {
    /// No body at all (null body).
    Empty,
    /// Fully buffered bytes.
    Full(Bytes),
    /// Chunks produced while the response is already in flight.
    Stream(BoxStream<'static, Result<Bytes, BodyError>>),
}

impl ResponseBody {
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        Self::Full(bytes.into())
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(bytes) => bytes.is_empty(),
            Self::Stream(_) => false,
        }
    }

    /// Drain the body into one buffer.
    pub async fn collect(self) -> Result<Bytes, BodyError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::Full(bytes)
    }
}

impl From<String> for ResponseBody {
    fn from(s: String) -> Self {
        Self::Full(Bytes::from(s))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(s: &'static str) -> Self {
        Self::Full(Bytes::from_static(s.as_bytes()))
    }
}

/// Writable end of a streamed response body.
///
/// Dropping the sink (or calling [`BodySink::end`]) terminates the stream.
#[derive(Debug, Clone)]
pub struct BodySink {
    tx: mpsc::UnboundedSender<Result<Bytes, BodyError>>,
}

impl BodySink {
    /// Create a sink and the stream it feeds.
    pub fn channel() -> (Self, BoxStream<'static, Result<Bytes, BodyError>>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx.boxed())
    }

    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<(), BodyError> {
        self.tx
            .unbounded_send(Ok(chunk.into()))
            .map_err(|_| BodyError::Closed)
    }

    /// Abort the stream with an error the reader will observe.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.unbounded_send(Err(BodyError::Stream(message.into())));
        self.tx.close_channel();
    }

    pub fn end(self) {
        self.tx.close_channel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_feeds_stream() {
        let (sink, stream) = BodySink::channel();
        sink.write("hello ").unwrap();
        sink.write(Bytes::from_static(b"world")).unwrap();
        sink.end();
        let body = ResponseBody::Stream(stream).collect().await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_failed_stream_surfaces_error() {
        let (sink, stream) = BodySink::channel();
        sink.write("partial").unwrap();
        sink.fail("renderer crashed");
        let err = ResponseBody::Stream(stream).collect().await.unwrap_err();
        assert_eq!(err, BodyError::Stream("renderer crashed".into()));
    }

    #[test]
    fn test_write_after_reader_dropped() {
        let (sink, stream) = BodySink::channel();
        drop(stream);
        assert_eq!(sink.write("x"), Err(BodyError::Closed));
    }

    #[test]
    fn test_empty_detection() {
        assert!(ResponseBody::Empty.is_empty());
        assert!(ResponseBody::full(Bytes::new()).is_empty());
        assert!(!ResponseBody::from("x").is_empty());
    }
}
