//! Server-sent-event framing shared by the relay and the terminal client
//!
//! Both hops of a chat turn speak the same line-oriented subset of SSE:
//! every `data:` line is one payload, blank lines separate frames, and all
//! other fields (`event:`, `id:`, `retry:`, comments) are ignored.
//!
//! Incoming bytes are buffered until a newline so that frames split across
//! network chunks (including inside multi-byte UTF-8 sequences) decode
//! intact.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

/// Incremental decoder turning raw SSE bytes into `data:` payloads
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every payload completed by it
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::sse::SseLineDecoder;
    ///
    /// let mut decoder = SseLineDecoder::new();
    /// assert!(decoder.push(b"data: {\"te").is_empty());
    /// assert_eq!(decoder.push(b"xt\":1}\n\n"), vec!["{\"text\":1}".to_string()]);
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_payload(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&rest).into_iter().collect()
    }
}

/// Extract the payload of a `data:` line, if the line is one
fn data_payload(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let value = text.strip_prefix("data:")?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    Some(value.to_string())
}

/// Encode one text delta as a relay frame: `data: {"text": ...}\n\n`
///
/// # Examples
///
/// ```
/// use studysphere::sse::encode_text_frame;
///
/// assert_eq!(&encode_text_frame("hi")[..], b"data: {\"text\":\"hi\"}\n\n");
/// ```
pub fn encode_text_frame(text: &str) -> Bytes {
    let payload = serde_json::json!({ "text": text });
    Bytes::from(format!("data: {}\n\n", payload))
}

/// Adapt a byte stream into a stream of `data:` payloads
///
/// The first upstream error is yielded and ends the stream; payloads
/// decoded before it are delivered first.
pub fn data_payloads<S, E>(upstream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Send,
{
    struct State<S> {
        upstream: S,
        decoder: SseLineDecoder,
        ready: VecDeque<String>,
        done: bool,
    }

    let state = State {
        upstream,
        decoder: SseLineDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.ready.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.done {
                return None;
            }
            match st.upstream.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.push(&chunk);
                    st.ready.extend(payloads);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    let payloads = st.decoder.finish();
                    st.ready.extend(payloads);
                }
            }
        }
    })
}
