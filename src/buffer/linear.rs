//! Linear buffer (spec §3/§4.C): a single contiguous write region with a write
//! cursor; flush invokes the sink handle and shifts any unconsumed suffix to the
//! front.

use crate::buffer::sink::{SinkCommand, SinkHandle};
use crate::error::{FluxError, FluxResult};

#[derive(Debug)]
pub struct LinearBuffer {
    arena: Vec<u8>,
    cap: usize,
    pos: usize,
    sink: Option<Box<dyn SinkHandle>>,
    bound_to_trace: bool,
}

impl LinearBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: vec![0u8; capacity],
            cap: capacity,
            pos: 0,
            sink: None,
            bound_to_trace: false,
        }
    }

    /// Legacy spelling of [`LinearBuffer::new`] (spec §9 "Deprecated alias").
    pub fn create_fixed_buffer(capacity: usize) -> Self {
        Self::new(capacity)
    }

    pub fn set_sink(&mut self, sink: Box<dyn SinkHandle>) {
        self.sink = Some(sink);
    }

    pub(crate) fn bind_to_trace(&mut self) -> FluxResult<()> {
        if self.bound_to_trace {
            return Err(FluxError::AlreadyUsed);
        }
        self.bound_to_trace = true;
        Ok(())
    }

    pub fn avail(&self) -> usize {
        self.cap - self.pos
    }

    pub fn cursor(&self) -> usize {
        self.pos
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Ensures at least `n` contiguous bytes are writable, flushing first if needed.
    pub fn request(&mut self, n: usize) -> FluxResult<()> {
        if n > self.cap {
            return Err(FluxError::Overflow);
        }
        if self.avail() < n {
            self.flush()?;
        }
        if self.avail() < n {
            return Err(FluxError::Overflow);
        }
        Ok(())
    }

    /// Writes `bytes` at the current cursor and advances it. Must follow a
    /// successful `request(bytes.len())` with no intervening buffer operation, so
    /// that no entry is ever split across a request/commit pair (spec §8).
    pub fn commit(&mut self, bytes: &[u8]) -> FluxResult<()> {
        if bytes.len() > self.avail() {
            return Err(FluxError::Overflow);
        }
        self.arena[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pos = 0;
    }

    pub fn flush(&mut self) -> FluxResult<()> {
        self.run_flush(SinkCommand::Flush)
    }

    pub fn deep_flush(&mut self) -> FluxResult<()> {
        self.run_flush(SinkCommand::DeepFlush)
    }

    fn run_flush(&mut self, command: SinkCommand) -> FluxResult<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let k = sink.handle(command, &self.arena[..self.pos])?;
        if k > self.pos {
            return Err(FluxError::InvalidValue);
        }
        if k == self.pos {
            self.pos = 0;
        } else if k > 0 {
            self.arena.copy_within(k..self.pos, 0);
            self.pos -= k;
        }
        Ok(())
    }

    /// Returns the bytes currently buffered (not yet consumed by a sink).
    pub fn get(&self) -> &[u8] {
        &self.arena[..self.pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::sink::NullSink;

    #[test]
    fn request_commit_advances_cursor() {
        let mut buf = LinearBuffer::new(16);
        buf.request(4).unwrap();
        buf.commit(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.cursor(), 4);
        assert_eq!(buf.get(), &[1, 2, 3, 4]);
    }

    #[test]
    fn overflow_when_no_sink_can_make_room() {
        let mut buf = LinearBuffer::new(4);
        buf.request(4).unwrap();
        buf.commit(&[1, 2, 3, 4]).unwrap();
        assert!(matches!(buf.request(1), Err(FluxError::Overflow)));
    }

    #[test]
    fn flush_with_partial_consumption_shifts_remainder() {
        struct HalfSink;
        impl SinkHandle for HalfSink {
            fn handle(&mut self, _c: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
                Ok(bytes.len() / 2)
            }
        }
        let mut buf = LinearBuffer::new(8);
        buf.set_sink(Box::new(HalfSink));
        buf.request(8).unwrap();
        buf.commit(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        buf.flush().unwrap();
        assert_eq!(buf.cursor(), 4);
        assert_eq!(buf.get(), &[5, 6, 7, 8]);
    }

    #[test]
    fn flush_with_full_consumption_resets_cursor() {
        let mut buf = LinearBuffer::new(8);
        buf.set_sink(Box::new(NullSinkThatTakesAll));
        buf.request(8).unwrap();
        buf.commit(&[0; 8]).unwrap();
        buf.flush().unwrap();
        assert_eq!(buf.cursor(), 0);

        struct NullSinkThatTakesAll;
        impl SinkHandle for NullSinkThatTakesAll {
            fn handle(&mut self, _c: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
                Ok(bytes.len())
            }
        }
    }

    #[test]
    fn no_sink_leaves_bytes_in_place() {
        let mut buf = LinearBuffer::new(8);
        buf.set_sink(Box::new(NullSink));
        buf.request(4).unwrap();
        buf.commit(&[9, 9, 9, 9]).unwrap();
        buf.flush().unwrap();
        assert_eq!(buf.cursor(), 4);
    }

    #[test]
    fn bind_to_trace_is_exclusive() {
        let mut buf = LinearBuffer::new(8);
        buf.bind_to_trace().unwrap();
        assert!(matches!(
            buf.bind_to_trace(),
            Err(FluxError::AlreadyUsed)
        ));
    }
}
