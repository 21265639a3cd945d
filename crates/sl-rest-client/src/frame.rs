// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Incremental frame scanner for the replay event stream
//!
//! The `stream` endpoint returns a chunked body containing back-to-back
//! top-level JSON objects with no delimiter or length prefix between them.
//! `FrameDecoder` recovers object boundaries by brace-depth counting,
//! skipping braces inside quoted strings and honoring backslash escapes.
//! It operates on raw bytes, so chunk boundaries may fall anywhere,
//! including in the middle of an escape sequence or a multi-byte
//! UTF-8 character.

/// Stateful scanner that extracts complete top-level JSON objects from an
/// incrementally arriving byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Scan position: everything before this offset has been examined
    pos: usize,
    depth: u32,
    in_string: bool,
    escaped: bool,
    /// Offset of the opening brace of the object currently being scanned
    start: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning the raw text of every object that
    /// became complete.
    ///
    /// Bytes between objects (whitespace or other noise at depth zero) are
    /// discarded. An object left incomplete at the end of the chunk is
    /// retained and completed by a later `push`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut complete = Vec::new();
        while self.pos < self.buf.len() {
            let b = self.buf[self.pos];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' if self.depth > 0 => self.in_string = true,
                    b'{' => {
                        if self.depth == 0 {
                            self.start = Some(self.pos);
                        }
                        self.depth += 1;
                    }
                    b'}' if self.depth > 0 => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            let start = self.start.take().expect("open brace recorded");
                            let text =
                                String::from_utf8_lossy(&self.buf[start..=self.pos]).into_owned();
                            complete.push(text);
                        }
                    }
                    // Depth zero and not an opening brace: inter-frame noise
                    _ => {}
                }
            }
            self.pos += 1;
        }

        // Drop consumed bytes; keep only the in-progress object, if any
        let drain_to = self.start.unwrap_or(self.pos);
        if drain_to > 0 {
            self.buf.drain(..drain_to);
            self.pos -= drain_to;
            if let Some(start) = self.start.as_mut() {
                *start -= drain_to;
            }
        }

        complete
    }

    /// Whether an object is still open (the stream ended mid-frame if this
    /// is true at end of input)
    pub fn has_partial(&self) -> bool {
        self.start.is_some()
    }

    /// Number of buffered bytes awaiting completion
    pub fn residue_len(&self) -> usize {
        self.buf.len()
    }
}
