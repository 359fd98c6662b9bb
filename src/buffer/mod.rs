//! Buffer substrate (module C): the two concrete arena strategies entries are
//! committed into, plus the sink-handle chaining contract that drains them.

pub mod linear;
pub mod ring;
pub mod sink;

pub use linear::LinearBuffer;
pub use ring::RingBuffer;
pub use sink::{CompressMode, CompressSink, Compressor, CopySink, Lz4Compressor, NullSink, SinkCommand, SinkHandle, WriteToFileSink};

use crate::error::FluxResult;

/// The REQUEST/COMMIT half of the buffer access contract (spec §3), common to
/// both arena disciplines so the entry writer (module D) can stay generic over
/// which one a trace is bound to.
pub trait WriteTarget {
    fn request(&mut self, n: usize) -> FluxResult<()>;
    fn commit(&mut self, bytes: &[u8]) -> FluxResult<()>;
    /// Exclusive trace binding (spec §3 "A buffer may be bound to at most one
    /// trace; binding is exclusive and symmetric").
    fn bind_to_trace(&mut self) -> FluxResult<()>;
}

impl WriteTarget for LinearBuffer {
    fn request(&mut self, n: usize) -> FluxResult<()> {
        LinearBuffer::request(self, n)
    }

    fn commit(&mut self, bytes: &[u8]) -> FluxResult<()> {
        LinearBuffer::commit(self, bytes)
    }

    fn bind_to_trace(&mut self) -> FluxResult<()> {
        LinearBuffer::bind_to_trace(self)
    }
}

impl WriteTarget for RingBuffer {
    fn request(&mut self, n: usize) -> FluxResult<()> {
        RingBuffer::request(self, n)
    }

    fn commit(&mut self, bytes: &[u8]) -> FluxResult<()> {
        RingBuffer::commit(self, bytes)
    }

    fn bind_to_trace(&mut self) -> FluxResult<()> {
        RingBuffer::bind_to_trace(self)
    }
}
