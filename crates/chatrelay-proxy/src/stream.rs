//! SSE → plain-text delta relay.
//!
//! The upstream streams chat-completion chunks as Server-Sent Events; the
//! browser client wants only the generated text. This module turns one into
//! the other on the fly:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}   →  Hel
//! data: {"choices":[{"delta":{"content":"lo"}}]}    →  lo
//! data: [DONE]                                      →  (end)
//! ```
//!
//! The output is pull-driven. Upstream bytes are read only when the client
//! body polls for more, and dropping the body drops the upstream stream with
//! it, which closes the upstream connection.

use bytes::Bytes;
use chatrelay_core::{RelayError, SseParser, decode_delta};
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::forward::ByteStream;

/// State threaded through the `unfold` stream.
struct RelayState {
    upstream: ByteStream,
    parser: SseParser,
    upstream_done: bool,
    failed: bool,
    emitted: usize,
}

/// Relay the text deltas of an upstream event stream.
///
/// Ends after `[DONE]` or when the upstream closes. A malformed event or an
/// upstream read error yields one error and ends the stream; bytes emitted
/// before it stand.
pub fn relay_deltas(upstream: ByteStream) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let state = RelayState {
        upstream,
        parser: SseParser::new(),
        upstream_done: false,
        failed: false,
        emitted: 0,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.failed {
            return None;
        }

        loop {
            // Drain events already parsed before reading more.
            while let Some(event) = st.parser.next() {
                if event.is_done() {
                    debug!(deltas = st.emitted, "Upstream stream finished");
                    return None;
                }

                match decode_delta(&event.data) {
                    Ok(Some(text)) => {
                        st.emitted += 1;
                        return Some((Ok(Bytes::from(text)), st));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, data = %event.data, "Malformed upstream event");
                        st.failed = true;
                        return Some((Err(std::io::Error::other(e)), st));
                    }
                }
            }

            if st.upstream_done {
                debug!(deltas = st.emitted, "Upstream closed without [DONE]");
                return None;
            }

            match st.upstream.next().await {
                Some(Ok(chunk)) => st.parser.feed(&chunk),
                Some(Err(e)) => {
                    warn!("Upstream stream error: {e}");
                    st.failed = true;
                    let err = RelayError::Upstream(e.to_string());
                    return Some((Err(std::io::Error::other(err)), st));
                }
                None => {
                    st.parser.finish();
                    st.upstream_done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    fn upstream_of(chunks: Vec<String>) -> ByteStream {
        let items: Vec<Result<Bytes, std::io::Error>> =
            chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        futures_util::stream::iter(items).boxed()
    }

    /// Collect successes until the first error.
    async fn drain(upstream: ByteStream) -> (String, Option<std::io::Error>) {
        let mut out = Vec::new();
        let mut relay = Box::pin(relay_deltas(upstream));
        while let Some(item) = relay.next().await {
            match item {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(e) => {
                    assert!(relay.next().await.is_none(), "stream continued after error");
                    return (String::from_utf8(out).unwrap(), Some(e));
                }
            }
        }
        (String::from_utf8(out).unwrap(), None)
    }

    #[tokio::test]
    async fn test_deltas_are_concatenated_in_order() {
        let chunks = vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n".to_string(),
            delta("Hel"),
            delta("lo, "),
            delta("world"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (text, err) = drain(upstream_of(chunks)).await;
        assert_eq!(text, "Hello, world");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_nothing_after_done_is_emitted() {
        let chunks = vec![
            delta("a"),
            format!("data: [DONE]\n\n{}", delta("ignored")),
        ];
        let (text, err) = drain(upstream_of(chunks)).await;
        assert_eq!(text, "a");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let whole = format!("{}{}data: [DONE]\r\n\r\n", delta("héllo"), delta(" there"));
        // Three-byte chunks split the two-byte `é` and the CRLF pairs.
        let items: Vec<Result<Bytes, std::io::Error>> = whole
            .as_bytes()
            .chunks(3)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let (text, err) = drain(futures_util::stream::iter(items).boxed()).await;
        assert_eq!(text, "héllo there");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_malformed_event_errors_after_earlier_bytes() {
        let chunks = vec![
            delta("kept"),
            "data: {not json}\n\n".to_string(),
            delta("never"),
        ];
        let (text, err) = drain(upstream_of(chunks)).await;
        assert_eq!(text, "kept");
        let err = err.expect("expected an error");
        assert!(err.to_string().starts_with("Malformed upstream event"));
    }

    #[tokio::test]
    async fn test_upstream_close_without_done_ends_cleanly() {
        let chunks = vec![delta("partial"), "data: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}".to_string()];
        let (text, err) = drain(upstream_of(chunks)).await;
        assert_eq!(text, "partial");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_upstream_read_error_ends_with_error() {
        let items: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta("x"))),
            Err(std::io::Error::other("reset by peer")),
        ];
        let (text, err) = drain(futures_util::stream::iter(items).boxed()).await;
        assert_eq!(text, "x");
        assert!(err.unwrap().to_string().contains("reset by peer"));
    }

    #[tokio::test]
    async fn test_comments_and_empty_deltas_are_skipped() {
        let chunks = vec![
            ": keep-alive\n\n".to_string(),
            "data: {\"choices\":[]}\n\n".to_string(),
            delta(""),
            delta("only"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (text, _) = drain(upstream_of(chunks)).await;
        assert_eq!(text, "only");
    }

    fn channel_upstream() -> (mpsc::Sender<Result<Bytes, std::io::Error>>, ByteStream) {
        let (tx, rx) = mpsc::channel(8);
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (tx, stream.boxed())
    }

    #[tokio::test]
    async fn test_done_releases_upstream() {
        let (tx, upstream) = channel_upstream();
        tx.send(Ok(Bytes::from(delta("a")))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"data: [DONE]\n\n"))).await.unwrap();

        let mut relay = Box::pin(relay_deltas(upstream));
        assert_eq!(relay.next().await.unwrap().unwrap(), Bytes::from("a"));
        assert!(relay.next().await.is_none());
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_dropping_output_releases_upstream() {
        let (tx, upstream) = channel_upstream();
        tx.send(Ok(Bytes::from(delta("first")))).await.unwrap();

        let mut relay = Box::pin(relay_deltas(upstream));
        assert_eq!(relay.next().await.unwrap().unwrap(), Bytes::from("first"));
        assert!(!tx.is_closed());

        drop(relay);
        assert!(tx.is_closed());
    }
}
