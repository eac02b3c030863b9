//! Incremental decoder for server-sent chat completion streams.
//!
//! Transports hand over text in arbitrary pieces. `StreamDecoder` reassembles
//! lines across piece boundaries, keeps only `data: ` records, and turns each
//! JSON payload into the text fragment found at `choices[0].delta.content`.
//! The literal `[DONE]` payload ends the stream.

use serde_json::Value;

const DATA_PREFIX: &str = "data: ";
const COMMENT_MARKER: char = ':';
const DONE_SENTINEL: &str = "[DONE]";

/// One fragment of assistant text, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDelta(pub String);

impl ContentDelta {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Streaming,
    Done,
}

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server sent the `[DONE]` record.
    Sentinel,
    /// The transport ran out of data without a sentinel.
    EndOfStream,
}

/// Summary returned by [`StreamDecoder::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCompletion {
    pub end: StreamEnd,
    /// Bytes still buffered when the stream ended. Non-zero means a record was
    /// truncated or never became parseable.
    pub leftover_bytes: usize,
}

/// Per-session decoding state. Never shared between streams.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    buffer: String,
    accumulated: String,
    phase: StreamPhase,
    end: Option<StreamEnd>,
    stalled: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            accumulated: String::new(),
            phase: StreamPhase::Streaming,
            end: None,
            stalled: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == StreamPhase::Done
    }

    /// Everything emitted so far, concatenated.
    #[must_use]
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// Unconsumed text waiting for a line feed.
    #[must_use]
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// True when the last `feed` stopped on a payload that did not parse.
    ///
    /// The line stays at the head of the buffer and is retried on the next
    /// call; if it never parses the stream stays pending until `finish`.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Consume one chunk and return the deltas it completed.
    ///
    /// Chunks fed after the stream is done are ignored.
    pub fn feed(&mut self, chunk: &str) -> Vec<ContentDelta> {
        let mut deltas = Vec::new();
        if self.is_done() {
            return deltas;
        }
        self.buffer.push_str(chunk);
        self.stalled = false;

        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.trim().is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim();

            if payload == DONE_SENTINEL {
                self.phase = StreamPhase::Done;
                self.end = Some(StreamEnd::Sentinel);
                self.buffer.clear();
                break;
            }

            match serde_json::from_str::<Value>(payload) {
                Ok(record) => {
                    if let Some(text) = delta_content(&record).filter(|t| !t.is_empty()) {
                        self.accumulated.push_str(text);
                        deltas.push(ContentDelta(text.to_owned()));
                    }
                }
                Err(_) => {
                    line.push('\n');
                    self.buffer.insert_str(0, &line);
                    self.stalled = true;
                    break;
                }
            }
        }

        deltas
    }

    /// Mark the transport as exhausted. Produces no further deltas.
    pub fn finish(&mut self) -> StreamCompletion {
        self.phase = StreamPhase::Done;
        let end = *self.end.get_or_insert(StreamEnd::EndOfStream);
        StreamCompletion {
            end,
            leftover_bytes: self.buffer.len(),
        }
    }
}

fn delta_content(record: &Value) -> Option<&str> {
    record
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

/// Turns raw byte chunks into text without splitting multi-byte characters.
///
/// A trailing partial UTF-8 sequence is held back until the next chunk.
/// Invalid sequences decode to U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}
