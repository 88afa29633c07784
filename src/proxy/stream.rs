//! Streaming relay: line-framed passthrough of the upstream event stream.
//!
//! Lines are forwarded to the client in arrival order with exactly one
//! transformation: upstream occasionally emits `"content":null` where
//! OpenAI-compatible clients expect an empty string, so that fragment is
//! rewritten to `"content":""`. Every other byte passes through unchanged.

use std::io;

use axum::body::Body;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

const NULL_CONTENT: &[u8] = b"\"content\":null";
const EMPTY_CONTENT: &[u8] = b"\"content\":\"\"";

/// Relay an upstream streaming response to the client as an axum [`Body`].
///
/// If the client disconnects the relay stops reading from upstream, which
/// drops the upstream connection. An upstream read error is surfaced as a
/// body error; output already written is not retracted.
pub fn relay(upstream: reqwest::Response) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(64);
    tokio::spawn(pump(upstream.bytes_stream(), tx));
    Body::from_stream(tokio_stream::wrappers::ReceiverStream::new(rx))
}

/// Read chunks from `source`, reassemble them into lines, and send each
/// rewritten line (newline-terminated) to `tx`. Chunk boundaries rarely
/// align with line boundaries, so a carry buffer holds the partial tail
/// between chunks; a final unterminated line is flushed at EOF.
async fn pump<S, E>(mut source: S, tx: mpsc::Sender<Result<Bytes, io::Error>>)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut carry: Vec<u8> = Vec::new();

    while let Some(chunk) = source.next().await {
        match chunk {
            Ok(bytes) => {
                carry.extend_from_slice(&bytes);
                while let Some(pos) = carry.iter().position(|&b| b == b'\n') {
                    let mut line: Vec<u8> = carry.drain(..=pos).collect();
                    line.pop(); // '\n'
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if tx.send(Ok(rewrite_line(&line))).await.is_err() {
                        // client disconnected
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Upstream stream read failed: {}", e);
                let err = io::Error::new(io::ErrorKind::BrokenPipe, e.to_string());
                let _ = tx.send(Err(err)).await;
                return;
            }
        }
    }

    if !carry.is_empty() {
        let _ = tx.send(Ok(rewrite_line(&carry))).await;
    }
}

/// Rewrite every `"content":null` in the line to `"content":""` and append
/// the framing newline.
fn rewrite_line(line: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(line.len() + 1);
    let mut rest = line;
    while let Some(idx) = find(rest, NULL_CONTENT) {
        out.extend_from_slice(&rest[..idx]);
        out.extend_from_slice(EMPTY_CONTENT);
        rest = &rest[idx + NULL_CONTENT.len()..];
    }
    out.extend_from_slice(rest);
    out.push(b'\n');
    Bytes::from(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn ok_chunks(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, String>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(rx: mpsc::Receiver<Result<Bytes, io::Error>>) -> Vec<Result<Bytes, io::Error>> {
        tokio_stream::wrappers::ReceiverStream::new(rx)
            .collect()
            .await
    }

    // ── Line rewriting ──────────────────────────────────────────

    #[test]
    fn null_content_is_rewritten_to_empty_string() {
        let line = br#"data: {"choices":[{"delta":{"content":null}}]}"#;
        let out = rewrite_line(line);
        assert_eq!(
            out.as_ref(),
            b"data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n"
        );
    }

    #[test]
    fn every_occurrence_on_a_line_is_rewritten() {
        let line = br#"{"a":{"content":null},"b":{"content":null}}"#;
        let out = rewrite_line(line);
        assert_eq!(
            out.as_ref(),
            b"{\"a\":{\"content\":\"\"},\"b\":{\"content\":\"\"}}\n"
        );
    }

    #[test]
    fn other_lines_pass_through_byte_identical() {
        let line = br#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        let out = rewrite_line(line);
        assert_eq!(&out[..out.len() - 1], line.as_slice());
        assert_eq!(out.last(), Some(&b'\n'));
    }

    #[test]
    fn content_null_as_a_string_value_is_left_alone() {
        // The sentinel is the literal JSON fragment, not the word "null".
        let line = br#"data: {"content":"null"}"#;
        let out = rewrite_line(line);
        assert_eq!(&out[..out.len() - 1], line.as_slice());
    }

    // ── Framing ─────────────────────────────────────────────────

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let source = ok_chunks(&["data: {\"a\"", ":1}\ndata: {\"b\":2}\n"]);
        let (tx, rx) = mpsc::channel(64);
        pump(source, tx).await;

        let out = collect(rx).await;
        let lines: Vec<Bytes> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].as_ref(), b"data: {\"a\":1}\n");
        assert_eq!(lines[1].as_ref(), b"data: {\"b\":2}\n");
    }

    #[tokio::test]
    async fn final_unterminated_line_is_flushed() {
        let source = ok_chunks(&["data: [DONE]"]);
        let (tx, rx) = mpsc::channel(64);
        pump(source, tx).await;

        let out = collect(rx).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().as_ref(), b"data: [DONE]\n");
    }

    #[tokio::test]
    async fn crlf_line_endings_are_normalized() {
        let source = ok_chunks(&["data: {\"a\":1}\r\n"]);
        let (tx, rx) = mpsc::channel(64);
        pump(source, tx).await;

        let out = collect(rx).await;
        assert_eq!(out[0].as_ref().unwrap().as_ref(), b"data: {\"a\":1}\n");
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let source = ok_chunks(&["1\n2\n", "3\n", "4\n5\n"]);
        let (tx, rx) = mpsc::channel(64);
        pump(source, tx).await;

        let lines: Vec<String> = collect(rx)
            .await
            .into_iter()
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect();
        assert_eq!(lines, vec!["1\n", "2\n", "3\n", "4\n", "5\n"]);
    }

    #[tokio::test]
    async fn upstream_read_error_is_surfaced() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n")),
            Err("connection reset".to_string()),
        ];
        let (tx, rx) = mpsc::channel(64);
        pump(stream::iter(chunks), tx).await;

        let out = collect(rx).await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[tokio::test]
    async fn client_disconnect_stops_the_pump() {
        let chunks: Vec<Result<Bytes, String>> =
            (0..100).map(|i| Ok(Bytes::from(format!("{i}\n")))).collect();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Must return promptly instead of buffering the whole stream.
        pump(stream::iter(chunks), tx).await;
    }
}
