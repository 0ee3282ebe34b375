//! Incremental JSON emitter: structural tokens are written as the caller
//! opens and closes objects and arrays, and each leaf fragment is
//! serialized with `serde_json` straight into the output.

use crate::error::{ConvertError, Result};
use serde::Serialize;
use std::io::Write;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    empty: bool,
}

pub struct JsonStream<W: Write> {
    out: W,
    pretty: bool,
    frames: Vec<Frame>,
}

impl<W: Write> JsonStream<W> {
    pub fn new(out: W, pretty: bool) -> Self {
        Self {
            out,
            pretty,
            frames: Vec::new(),
        }
    }

    pub fn begin_object(&mut self, key: Option<&str>) -> Result<()> {
        self.open(key, FrameKind::Object)
    }

    pub fn begin_array(&mut self, key: Option<&str>) -> Result<()> {
        self.open(key, FrameKind::Array)
    }

    /// Close the innermost object or array.
    pub fn end(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ConvertError::Structural("json stream: nothing to close".to_string()))?;
        if self.pretty && !frame.empty {
            self.newline()?;
        }
        let token: &[u8] = match frame.kind {
            FrameKind::Object => b"}",
            FrameKind::Array => b"]",
        };
        self.out.write_all(token)?;
        Ok(())
    }

    pub fn field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.member(Some(key))?;
        self.write_value(value)
    }

    pub fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.member(None)?;
        self.write_value(value)
    }

    /// Flush and hand back the writer; every frame must be closed.
    pub fn finish(mut self) -> Result<W> {
        if !self.frames.is_empty() {
            return Err(ConvertError::Structural(format!(
                "json stream finished with {} open frame(s)",
                self.frames.len()
            )));
        }
        if self.pretty {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn open(&mut self, key: Option<&str>, kind: FrameKind) -> Result<()> {
        self.member(key)?;
        let token: &[u8] = match kind {
            FrameKind::Object => b"{",
            FrameKind::Array => b"[",
        };
        self.out.write_all(token)?;
        self.frames.push(Frame { kind, empty: true });
        Ok(())
    }

    /// Separator, indentation and key for the next member of the
    /// innermost frame.
    fn member(&mut self, key: Option<&str>) -> Result<()> {
        let Some(frame) = self.frames.last_mut() else {
            return match key {
                None => Ok(()),
                Some(key) => Err(ConvertError::Structural(format!(
                    "json stream: key '{key}' outside of an object"
                ))),
            };
        };
        match (frame.kind, key) {
            (FrameKind::Object, None) => {
                return Err(ConvertError::Structural(
                    "json stream: object member without a key".to_string(),
                ))
            }
            (FrameKind::Array, Some(key)) => {
                return Err(ConvertError::Structural(format!(
                    "json stream: key '{key}' inside an array"
                )))
            }
            _ => {}
        }
        let first = frame.empty;
        frame.empty = false;

        if !first {
            self.out.write_all(b",")?;
        }
        if self.pretty {
            self.newline()?;
        }
        if let Some(key) = key {
            serde_json::to_writer(&mut self.out, key)?;
            let colon: &[u8] = if self.pretty { b": " } else { b":" };
            self.out.write_all(colon)?;
        }
        Ok(())
    }

    fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.pretty {
            // String values never contain a raw newline, so re-indenting the
            // pretty output line by line is safe.
            let rendered = serde_json::to_string_pretty(value)?;
            let indent = format!("\n{}", INDENT.repeat(self.frames.len()));
            self.out.write_all(rendered.replace('\n', &indent).as_bytes())?;
        } else {
            serde_json::to_writer(&mut self.out, value)?;
        }
        Ok(())
    }

    fn newline(&mut self) -> Result<()> {
        self.out.write_all(b"\n")?;
        for _ in 0..self.frames.len() {
            self.out.write_all(INDENT.as_bytes())?;
        }
        Ok(())
    }
}
