//! Flux: an embeddable waveform-trace producer and control channel.
//!
//! The crate is organized around the wire format's own layering: primitive
//! varint/float/text codecs ([`varint`]), logic-state packing ([`logic`]),
//! the buffer substrate entries are committed into ([`buffer`]), the entry
//! writers themselves ([`entry`]), the trace state machine that drives them
//! ([`trace`]), and the control-channel parser ([`control`]).

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate log;

pub mod buffer;
pub mod control;
pub mod entry;
pub mod error;
pub mod logic;
pub mod trace;
mod varint;

pub use crate::error::{FluxError, FluxResult};

pub use crate::buffer::{
    CompressMode, CompressSink, Compressor, CopySink, LinearBuffer, Lz4Compressor, NullSink,
    RingBuffer, SinkCommand, SinkHandle, WriteTarget, WriteToFileSink,
};

pub use crate::control::{
    ControlHandler, ControlParser, HandlerCommand, MessageDirection, ParamAccept, ParamValue,
};

pub use crate::entry::{MemberData, MemberType, MemberValue, SignalType, Tag};

pub use crate::logic::{LogicCode, StateLevel};

pub use crate::trace::{ItemKind, Open, Trace, TraceBuilder};
