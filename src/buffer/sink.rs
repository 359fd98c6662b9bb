//! Sink-handle contract: the four-function chaining protocol a buffer calls into on
//! flush (spec §4.C "Sink chaining").

use crate::error::FluxResult;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// What triggered a sink-handle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCommand {
    Flush,
    DeepFlush,
}

/// A downstream consumer of a buffer's bytes on flush.
///
/// Implementations return how many bytes of the given prefix they consumed
/// (`0..=bytes.len()`); the buffer shifts any unconsumed suffix to the front,
/// matching the `[0, k]` prefix-consumption contract in spec §3.
pub trait SinkHandle: std::fmt::Debug {
    fn handle(&mut self, command: SinkCommand, bytes: &[u8]) -> FluxResult<usize>;
}

/// `flxCopy`: forwards bytes verbatim into a downstream linear buffer, cascading
/// `DeepFlush` onward.
#[derive(Debug)]
pub struct CopySink {
    downstream: Rc<RefCell<crate::buffer::linear::LinearBuffer>>,
}

impl CopySink {
    pub fn new(downstream: Rc<RefCell<crate::buffer::linear::LinearBuffer>>) -> Self {
        Self { downstream }
    }
}

impl SinkHandle for CopySink {
    fn handle(&mut self, command: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
        let mut down = self.downstream.borrow_mut();
        down.request(bytes.len())?;
        down.commit(bytes)?;
        if command == SinkCommand::DeepFlush {
            down.deep_flush()?;
        }
        Ok(bytes.len())
    }
}

/// The two compression modes a `PBLK` entry can carry (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressMode {
    Lz4 = 0,
    FastLz = 1,
}

/// An opaque byte-to-byte compressor, matching spec §1's treatment of compression
/// libraries as collaborator interfaces outside the core.
pub trait Compressor: std::fmt::Debug {
    fn mode(&self) -> CompressMode;
    fn compress(&self, input: &[u8]) -> Vec<u8>;
}

/// `lz4_flex`-backed compressor: the one concrete `Compressor` the core ships, since
/// FastLZ has no maintained crate in this ecosystem (documented in DESIGN.md).
#[derive(Debug, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn mode(&self) -> CompressMode {
        CompressMode::Lz4
    }

    fn compress(&self, input: &[u8]) -> Vec<u8> {
        lz4_flex::compress(input)
    }
}

/// `flxCompressLz4` / `flxCompressFlz`: compresses the flushed bytes and emits a
/// single `PBLK` entry carrying `{mode, originalSize, compressedSize, payload}` into
/// a downstream buffer.
#[derive(Debug)]
pub struct CompressSink<C: Compressor> {
    compressor: C,
    downstream: Rc<RefCell<crate::buffer::linear::LinearBuffer>>,
}

impl<C: Compressor> CompressSink<C> {
    pub fn new(compressor: C, downstream: Rc<RefCell<crate::buffer::linear::LinearBuffer>>) -> Self {
        Self {
            compressor,
            downstream,
        }
    }
}

impl<C: Compressor + std::fmt::Debug> SinkHandle for CompressSink<C> {
    fn handle(&mut self, command: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
        let compressed = self.compressor.compress(bytes);
        let mut down = self.downstream.borrow_mut();
        crate::entry::write_pblk(
            &mut *down,
            self.compressor.mode() as u8,
            bytes.len() as u64,
            &compressed,
        )?;
        if command == SinkCommand::DeepFlush {
            down.deep_flush()?;
        }
        Ok(bytes.len())
    }
}

/// `flxWriteToFile`: writes the flushed prefix to a byte sink and flushes it.
#[derive(Debug)]
pub struct WriteToFileSink<W: Write + std::fmt::Debug> {
    out: W,
}

impl<W: Write + std::fmt::Debug> WriteToFileSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + std::fmt::Debug> SinkHandle for WriteToFileSink<W> {
    fn handle(&mut self, _command: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
        self.out.write_all(bytes)?;
        self.out.flush()?;
        Ok(bytes.len())
    }
}

/// No-op sink that never consumes bytes; used in tests and for scenarios where the
/// caller only wants to inspect the arena via `GET`.
#[derive(Debug, Default)]
pub struct NullSink;

impl SinkHandle for NullSink {
    fn handle(&mut self, _command: SinkCommand, _bytes: &[u8]) -> FluxResult<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::linear::LinearBuffer;

    #[test]
    fn null_sink_consumes_nothing() {
        let mut sink = NullSink;
        assert_eq!(sink.handle(SinkCommand::Flush, &[1, 2, 3]).unwrap(), 0);
    }

    #[test]
    fn copy_sink_forwards_bytes_verbatim() {
        let downstream = Rc::new(RefCell::new(LinearBuffer::new(64)));
        let mut sink = CopySink::new(downstream.clone());
        let consumed = sink.handle(SinkCommand::Flush, &[1, 2, 3, 4]).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(downstream.borrow().get(), &[1, 2, 3, 4]);
    }

    #[test]
    fn compress_sink_emits_a_pblk_entry() {
        let downstream = Rc::new(RefCell::new(LinearBuffer::new(256)));
        let mut sink = CompressSink::new(Lz4Compressor, downstream.clone());
        let input = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let consumed = sink.handle(SinkCommand::Flush, input).unwrap();
        assert_eq!(consumed, input.len());

        let out = downstream.borrow();
        let bytes = out.get();
        assert_eq!(&bytes[..2], &[0x00, 0x05]); // entry prefix + Pblk tag
        assert_eq!(bytes[2], CompressMode::Lz4 as u8);

        let compressed = lz4_flex::compress(input);
        let mut expected = Vec::new();
        expected.push(0x00);
        expected.push(0x05);
        expected.push(CompressMode::Lz4 as u8);
        crate::varint::write_uvarint(&mut expected, input.len() as u64);
        crate::varint::write_uvarint(&mut expected, compressed.len() as u64);
        expected.extend_from_slice(&compressed);
        assert_eq!(bytes, expected.as_slice());
    }

    #[test]
    fn write_to_file_sink_writes_and_flushes() {
        let mut sink = WriteToFileSink::new(Vec::new());
        let consumed = sink.handle(SinkCommand::Flush, b"hello").unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(sink.out, b"hello");
    }
}
