//! Decoding of the `data: ...` event stream produced by the chat gateway.
//!
//! Each JSON frame carries at most one text delta at `choices[0].delta.content`.
//! Frames that fail to parse are reported as [`Frame::Malformed`] and never
//! abort decoding.

use serde_json::Value;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Delta(String),
    Done,
    Malformed,
    /// Not a data line, or a data frame without a text delta.
    Ignored,
}

pub fn extract_delta(value: &Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
}

pub fn parse_line(line: &str) -> Frame {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => match extract_delta(&value) {
            Some(delta) if !delta.is_empty() => Frame::Delta(delta.to_string()),
            _ => Frame::Ignored,
        },
        Err(_) => Frame::Malformed,
    }
}

/// Splits a chunked byte stream into lines, carrying partial lines (and split
/// UTF-8 sequences) over to the next chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            push_frame(&mut frames, parse_line(&line));
        }
        frames
    }

    /// Flushes a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            push_frame(&mut frames, parse_line(&String::from_utf8_lossy(&rest)));
        }
        frames
    }
}

fn push_frame(frames: &mut Vec<Frame>, frame: Frame) {
    if frame != Frame::Ignored {
        frames.push(frame);
    }
}

/// Concatenates every delta of a finished stream, in order.
pub fn accumulate<I, B>(chunks: I) -> String
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut decoder = SseDecoder::new();
    let mut content = String::new();
    let mut append = |frames: Vec<Frame>| {
        for frame in frames {
            if let Frame::Delta(delta) = frame {
                content.push_str(&delta);
            }
        }
    };
    for chunk in chunks {
        append(decoder.feed(chunk.as_ref()));
    }
    append(decoder.finish());
    content
}
