//! Line framing for streamed responses (SSE and NDJSON).
//!
//! Both Gemini/OpenAI server-sent events and Ollama's newline-delimited
//! JSON are line oriented. [`LineDecoder`] turns arbitrary byte chunks into
//! complete lines; [`read_lines`] drives it over a `reqwest` body.
//!
//! A body that fails mid-read surfaces as [`SummarizerError::Stream`], which
//! the default classification treats as a transport failure.

use futures_util::StreamExt;

use crate::{Result, SummarizerError};

/// Incremental splitter of a byte stream into lines.
///
/// Lines may span chunk boundaries, including in the middle of a multi-byte
/// UTF-8 sequence; bytes are buffered until the newline arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed (without `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(Self::decode(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Flush an unterminated trailing line, if any.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(Self::decode(&self.buffer))
        }
    }

    fn decode(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Payload of an SSE `data:` line, if the line is one.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Read a streamed body line by line.
///
/// Blank lines are skipped. `on_line` may stop early with an error; body
/// read failures are mapped to [`SummarizerError::Stream`].
pub(crate) async fn read_lines<F>(response: reqwest::Response, mut on_line: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut body = response.bytes_stream();
    let mut decoder = LineDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| SummarizerError::Stream(e.without_url().to_string()))?;
        for line in decoder.push(&chunk) {
            if !line.trim().is_empty() {
                on_line(&line)?;
            }
        }
    }
    if let Some(line) = decoder.finish()
        && !line.trim().is_empty()
    {
        on_line(&line)?;
    }
    Ok(())
}
