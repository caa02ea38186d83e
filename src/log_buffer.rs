//! Bounded in-memory log sink.
//!
//! The demo registers a global [`LogBuffer`] before installing the tracing
//! subscriber so log output lands here instead of on the alternate screen.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const DEFAULT_MAX_LINES: usize = 2000;
static GLOBAL_LOG: OnceLock<LogBuffer> = OnceLock::new();

pub fn set_global_log_buffer(buffer: LogBuffer) -> bool {
    GLOBAL_LOG.set(buffer).is_ok()
}

pub fn global_log_buffer() -> Option<LogBuffer> {
    GLOBAL_LOG.get().cloned()
}

#[derive(Debug)]
struct Lines {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl Lines {
    fn push_line(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogBuffer {
    inner: Arc<Mutex<Lines>>,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Lines {
                lines: VecDeque::new(),
                max_lines: max_lines.max(1),
            })),
        }
    }

    pub fn new_default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }

    pub fn push(&self, line: impl Into<String>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_line(line.into());
    }

    /// The last `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<String> {
        let lines = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = lines.lines.len().saturating_sub(count);
        lines.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lines
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn writer(&self) -> LogBufferWriter {
        LogBufferWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}

/// `io::Write` adapter that splits output into lines.
#[derive(Debug)]
pub struct LogBufferWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl LogBufferWriter {
    fn flush_pending(&mut self, force: bool) {
        if self.pending.is_empty() {
            return;
        }
        let end = if force {
            self.pending.len()
        } else {
            match self.pending.iter().rposition(|b| *b == b'\n') {
                Some(pos) => pos + 1,
                None => return,
            }
        };
        let drained: Vec<u8> = self.pending.drain(..end).collect();
        let text = String::from_utf8_lossy(&drained);
        for line in text.split('\n').filter(|line| !line.is_empty()) {
            self.buffer.push(line.to_string());
        }
    }
}

impl Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.flush_pending(false);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending(true);
        Ok(())
    }
}

impl Drop for LogBufferWriter {
    fn drop(&mut self) {
        self.flush_pending(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_capped() {
        let buffer = LogBuffer::new(3);
        for line in ["one", "two", "three", "four"] {
            buffer.push(line);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.tail(10), ["two", "three", "four"]);
        assert_eq!(buffer.tail(1), ["four"]);
    }

    #[test]
    fn writer_splits_lines_and_flushes_partial() {
        let buffer = LogBuffer::new(10);
        let mut writer = buffer.writer();
        writer
            .write_all(b"first line\nsecond line\npartial")
            .unwrap();
        assert_eq!(buffer.tail(10), ["first line", "second line"]);
        writer.flush().unwrap();
        assert_eq!(buffer.tail(1), ["partial"]);
    }

    #[test]
    fn dropping_writer_keeps_pending_output() {
        let buffer = LogBuffer::new(10);
        {
            let mut writer = buffer.writer();
            writer.write_all(b"unterminated").unwrap();
        }
        assert_eq!(buffer.tail(1), ["unterminated"]);
    }
}
