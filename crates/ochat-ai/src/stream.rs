//! Streaming event types and the byte-stream adapter

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::decode::{NdjsonDecoder, parse_line};

/// Events emitted while a response is streaming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text from a `response` field
    Fragment { text: String },
    /// A line could not be parsed; the stream continues
    Malformed { line: String, error: String },
    /// The generator reported its final object
    Done { reason: Option<String> },
    /// Reading the body failed; no further events follow
    Failed { message: String },
    /// The session was cancelled; no further events follow
    Cancelled,
}

/// A stream of decoded response events
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Adapt a raw body stream into [`StreamEvent`]s.
///
/// Every chunk read races the cancellation token, and the token is checked
/// again between the lines of one chunk, so nothing is delivered after
/// cancellation is observed. A trailing line without a newline is delivered
/// when the body ends normally.
pub fn fragment_stream<S, B, E>(
    byte_stream: S,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream! {
        let mut bytes = std::pin::pin!(byte_stream);
        let mut decoder = NdjsonDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = bytes.next() => Some(next),
            };

            let chunk = match next {
                None => {
                    tracing::debug!("stream cancelled");
                    yield StreamEvent::Cancelled;
                    return;
                }
                Some(None) => break,
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(e))) => {
                    tracing::warn!("stream read failed: {}", e);
                    yield StreamEvent::Failed { message: e.to_string() };
                    return;
                }
            };

            for line in decoder.feed(chunk.as_ref()) {
                if cancel.is_cancelled() {
                    yield StreamEvent::Cancelled;
                    return;
                }
                for event in line_events(&line) {
                    yield event;
                }
            }
        }

        for line in decoder.finish() {
            for event in line_events(&line) {
                yield event;
            }
        }
    }
}

fn line_events(line: &str) -> Vec<StreamEvent> {
    let parsed = match parse_line(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("skipping malformed line: {}", e);
            return vec![StreamEvent::Malformed {
                line: line.to_string(),
                error: e.to_string(),
            }];
        }
    };

    let mut events = Vec::new();
    match parsed.response {
        Some(text) if !text.is_empty() => events.push(StreamEvent::Fragment { text }),
        Some(_) => {}
        None => tracing::trace!("ignoring line without response: {}", line),
    }
    if parsed.done {
        events.push(StreamEvent::Done {
            reason: parsed.done_reason,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type Chunk = std::result::Result<Vec<u8>, String>;

    fn chunks(parts: &[&[u8]]) -> Vec<Chunk> {
        parts.iter().map(|p| Ok(p.to_vec())).collect()
    }

    fn text_chunks(parts: &[&str]) -> Vec<Chunk> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    async fn collect(parts: Vec<Chunk>) -> Vec<StreamEvent> {
        fragment_stream(stream::iter(parts), CancellationToken::new())
            .collect()
            .await
    }

    fn text_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Fragment { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fragments_concatenate_across_arbitrary_splits() {
        let body = b"{\"response\":\"Hel\"}\n{\"response\":\"lo \"}\n{\"response\":\"world\"}\n";
        for cut in 1..body.len() {
            let events = collect(chunks(&[&body[..cut], &body[cut..]])).await;
            assert_eq!(text_of(&events), "Hello world", "cut at {}", cut);
        }
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_stop_stream() {
        let events = collect(text_chunks(&[
            "{\"response\":\"a\"}\n{broken\n",
            "{\"response\":\"b\"}\n",
        ]))
        .await;
        assert_eq!(text_of(&events), "ab");
        assert!(matches!(&events[1], StreamEvent::Malformed { line, .. } if line == "{broken"));
    }

    #[tokio::test]
    async fn test_lines_without_response_are_ignored() {
        let events = collect(text_chunks(&[
            "{\"model\":\"llama3.1\"}\n{\"response\":\"x\"}\n{\"response\":\"\",\"done\":true,\"done_reason\":\"stop\"}\n",
        ]))
        .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment { text: "x".into() },
                StreamEvent::Done {
                    reason: Some("stop".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_delivered() {
        let events = collect(text_chunks(&["{\"response\":\"end\"}"])).await;
        assert_eq!(text_of(&events), "end");
    }

    #[tokio::test]
    async fn test_multibyte_char_split_between_chunks() {
        let body = "{\"response\":\"日本\"}\n".as_bytes();
        let cut = body.iter().position(|&b| b >= 0x80).unwrap() + 2;
        let events = collect(chunks(&[&body[..cut], &body[cut..]])).await;
        assert_eq!(text_of(&events), "日本");
    }

    #[tokio::test]
    async fn test_read_error_is_terminal() {
        let parts: Vec<Chunk> = vec![
            Ok(b"{\"response\":\"a\"}\n".to_vec()),
            Err("connection reset".into()),
            Ok(b"{\"response\":\"never\"}\n".to_vec()),
        ];
        let events = collect(parts).await;
        assert_eq!(text_of(&events), "a");
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Failed {
                message: "connection reset".into()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_body_yields_nothing() {
        assert!(collect(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_reading() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<_> = fragment_stream(
            stream::iter(text_chunks(&["{\"response\":\"x\"}\n"])),
            cancel,
        )
        .collect()
        .await;
        assert_eq!(events, vec![StreamEvent::Cancelled]);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_drops_buffered_partial_line() {
        let cancel = CancellationToken::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Chunk>();
        let mut events = Box::pin(fragment_stream(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
            cancel.clone(),
        ));

        tx.send(Ok(b"{\"response\":\"kept\"}\n{\"response\":\"par".to_vec()))
            .unwrap();
        assert_eq!(
            events.next().await,
            Some(StreamEvent::Fragment {
                text: "kept".into()
            })
        );

        cancel.cancel();
        tx.send(Ok(b"tial\"}\n".to_vec())).unwrap();
        assert_eq!(events.next().await, Some(StreamEvent::Cancelled));
        assert_eq!(events.next().await, None);
    }
}
