//! Builder-style trace construction (SPEC_FULL.md §10.3), grounded on
//! `ConnectParamsBuilder`'s pattern of a fallible `build()`.

use super::Trace;
use crate::buffer::WriteTarget;
use crate::entry::MODE_NORMAL;
use crate::error::{FluxError, FluxResult};

/// Accumulates the handful of values a [`Trace`] needs before it can be
/// created, with defaults matching a single-trace, single-open, normal-mode
/// stream.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    id: u64,
    mode: u8,
    max_item_id: u64,
    max_entry_size: u64,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self {
            id: 0,
            mode: MODE_NORMAL,
            max_item_id: 0,
            max_entry_size: 0,
        }
    }

    pub fn id(&mut self, id: u64) -> &mut Self {
        self.id = id;
        self
    }

    pub fn mode(&mut self, mode: u8) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Sets the number of addressable items. `0` keeps single-open mode
    /// (only the root, item 0, may be opened).
    pub fn max_item_id(&mut self, max_item_id: u64) -> &mut Self {
        self.max_item_id = max_item_id;
        self
    }

    pub fn max_entry_size(&mut self, max_entry_size: u64) -> &mut Self {
        self.max_entry_size = max_entry_size;
        self
    }

    pub fn build<B: WriteTarget>(&self) -> FluxResult<Trace<B>> {
        if self.mode > 1 {
            return Err(FluxError::InvalidValue);
        }
        Ok(Trace::new(
            self.id,
            self.mode,
            self.max_item_id,
            self.max_entry_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LinearBuffer;

    #[test]
    fn defaults_build_a_single_open_trace() {
        let trace: Trace<LinearBuffer> = TraceBuilder::new().build().unwrap();
        assert_eq!(trace.id(), 0);
        assert_eq!(trace.mode(), MODE_NORMAL);
    }

    #[test]
    fn rejects_unknown_mode() {
        let result: FluxResult<Trace<LinearBuffer>> = TraceBuilder::new().mode(7).build();
        assert!(matches!(result, Err(FluxError::InvalidValue)));
    }
}
