//! Trace state machine (module E): item registry, open/close lifecycle with
//! container propagation, domain-position monotonicity, and write-time
//! validation, delegating wire emission to [`crate::entry`] (module D).

mod builder;

pub use builder::TraceBuilder;

use crate::buffer::WriteTarget;
use crate::entry::{self, MemberValue, SignalType};
use crate::error::{FluxError, FluxResult};
use crate::logic::LogicCode;

/// An item's definedness and role (spec §3 `type`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Undefined,
    Scope,
    Signal,
}

/// The `{current | openId}` union, keyed by open state (spec §9 "Union-in-item").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Open {
    None,
    /// This item itself is the open ancestor; carries its current domain position.
    Local(i64),
    /// An ancestor `openId` is the open one; this item merely reflects it.
    Container(u64),
}

#[derive(Clone, Debug)]
struct Item {
    parent_id: u64,
    kind: ItemKind,
    open: Open,
}

impl Item {
    fn undefined() -> Self {
        Self {
            parent_id: 0,
            kind: ItemKind::Undefined,
            open: Open::None,
        }
    }
}

/// `{id, mode, maxItemId, maxEntrySize, buffer, items[maxItemId], root_open,
/// root_current}` (spec §3). Generic over the bound buffer's arena discipline.
#[derive(Debug)]
pub struct Trace<B: WriteTarget> {
    id: u64,
    mode: u8,
    max_item_id: u64,
    max_entry_size: u64,
    buffer: Option<B>,
    /// `items[1..=max_item_id]`, stored 0-indexed (`items[i]` is item `i + 1`).
    /// Empty when the caller asserted single-open mode (spec §3 "elided").
    items: Vec<Item>,
    root_open: Open,
    dump_enabled: bool,
}

impl<B: WriteTarget> Trace<B> {
    /// Creates a trace with all items `UNDEFINED`, all opens `NONE`, and no
    /// buffer bound. `max_item_id == 0` asserts single-open mode: only item 0
    /// (the root) may ever be opened or closed.
    pub fn new(id: u64, mode: u8, max_item_id: u64, max_entry_size: u64) -> Self {
        let items = if max_item_id == 0 {
            Vec::new()
        } else {
            vec![Item::undefined(); max_item_id as usize]
        };
        Self {
            id,
            mode,
            max_item_id,
            max_entry_size,
            buffer: None,
            items,
            root_open: Open::None,
            dump_enabled: true,
        }
    }

    /// Binds `buffer` to this trace, exclusively (spec §4.E "SetBuffer").
    pub fn set_buffer(&mut self, mut buffer: B) -> FluxResult<()> {
        buffer.bind_to_trace()?;
        self.buffer = Some(buffer);
        trace!("trace {}: buffer bound", self.id);
        Ok(())
    }

    /// Dump-suspend toggle (SPEC_FULL.md §11): while disabled, every `write_*`
    /// call below returns `Ok(())` without touching the buffer.
    pub fn set_dump_enabled(&mut self, enabled: bool) {
        debug!("trace {}: dump {}", self.id, if enabled { "resumed" } else { "suspended" });
        self.dump_enabled = enabled;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Read-only access to the bound buffer, for callers that need to flush or
    /// inspect it directly.
    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    fn buffer_mut(&mut self) -> FluxResult<&mut B> {
        self.buffer.as_mut().ok_or(FluxError::NoBuffer)
    }

    fn item(&self, item_id: u64) -> FluxResult<&Item> {
        if item_id == 0 || item_id > self.max_item_id {
            return Err(FluxError::InvalidId);
        }
        self.items
            .get(item_id as usize - 1)
            .ok_or(FluxError::InvalidId)
    }

    fn item_mut(&mut self, item_id: u64) -> FluxResult<&mut Item> {
        if item_id == 0 || item_id > self.max_item_id {
            return Err(FluxError::InvalidId);
        }
        self.items
            .get_mut(item_id as usize - 1)
            .ok_or(FluxError::InvalidId)
    }

    fn emit_head(&mut self, name: &str, description: &str) -> FluxResult<()> {
        let (mode, max_item_id, max_entry_size, id) =
            (self.mode, self.max_item_id, self.max_entry_size, self.id);
        entry::write_head(
            self.buffer_mut()?,
            id,
            name,
            description,
            mode,
            max_item_id,
            max_entry_size,
        )?;
        Ok(())
    }

    /// Emits the stream's `Head` entry (spec §8 scenario 1). Must be called
    /// before any other write for a fresh buffer.
    pub fn write_head(&mut self, name: &str, description: &str) -> FluxResult<()> {
        if !self.dump_enabled {
            return Ok(());
        }
        self.emit_head(name, description)
    }

    // -- Item definitions (spec §4.E "Item definitions") --------------------

    fn validate_new_item(&self, item_id: u64, parent_id: u64) -> FluxResult<()> {
        if item_id == 0 || item_id > self.max_item_id {
            return Err(FluxError::InvalidId);
        }
        if parent_id > self.max_item_id {
            return Err(FluxError::InvalidId);
        }
        if parent_id != 0 && self.item(parent_id)?.kind != ItemKind::Scope {
            return Err(FluxError::ParentNotDefined);
        }
        if self.item(item_id)?.kind != ItemKind::Undefined {
            return Err(FluxError::ItemAlreadyDefined);
        }
        Ok(())
    }

    pub fn define_scope(
        &mut self,
        item_id: u64,
        parent_id: u64,
        name: &str,
        description: &str,
    ) -> FluxResult<()> {
        self.validate_new_item(item_id, parent_id)?;
        if self.dump_enabled {
            entry::write_scope_def(self.buffer_mut()?, item_id, parent_id, name, description)?;
        }
        let item = self.item_mut(item_id)?;
        item.kind = ItemKind::Scope;
        item.parent_id = parent_id;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn define_signal(
        &mut self,
        item_id: u64,
        parent_id: u64,
        name: &str,
        description: &str,
        signal_type: SignalType,
        descriptor: Option<&str>,
    ) -> FluxResult<()> {
        self.validate_new_item(item_id, parent_id)?;
        if self.dump_enabled {
            entry::write_signal_def(
                self.buffer_mut()?,
                item_id,
                parent_id,
                name,
                description,
                signal_type,
                descriptor,
            )?;
        }
        let item = self.item_mut(item_id)?;
        item.kind = ItemKind::Signal;
        item.parent_id = parent_id;
        Ok(())
    }

    /// Signal reference (spec §4.E): the target must already be a defined
    /// `SIGNAL`; no new slot is reserved, only a reference-def entry is emitted.
    pub fn define_signal_reference(
        &mut self,
        item_id: u64,
        parent_id: u64,
        name: &str,
        description: &str,
        referenced_item_id: u64,
    ) -> FluxResult<()> {
        self.validate_new_item(item_id, parent_id)?;
        if self.item(referenced_item_id)?.kind != ItemKind::Signal {
            return Err(FluxError::ItemNotDefined);
        }
        if self.dump_enabled {
            entry::write_signal_reference_def(
                self.buffer_mut()?,
                item_id,
                parent_id,
                name,
                description,
                referenced_item_id,
            )?;
        }
        let item = self.item_mut(item_id)?;
        item.kind = ItemKind::Signal;
        item.parent_id = parent_id;
        Ok(())
    }

    // -- Open / close (spec §4.E) --------------------------------------------

    fn ancestors(&self, item_id: u64) -> FluxResult<Vec<u64>> {
        let mut chain = Vec::new();
        let mut current = item_id;
        loop {
            let parent_id = if current == 0 { break } else { self.item(current)?.parent_id };
            if parent_id == 0 {
                break;
            }
            chain.push(parent_id);
            current = parent_id;
        }
        Ok(chain)
    }

    fn is_open(&self, item_id: u64) -> FluxResult<bool> {
        let open = if item_id == 0 {
            self.root_open
        } else {
            self.item(item_id)?.open
        };
        Ok(!matches!(open, Open::None))
    }

    fn has_open_descendant(&self, item_id: u64) -> FluxResult<bool> {
        for id in 1..=self.max_item_id {
            if id == item_id {
                continue;
            }
            if self.ancestors(id)?.contains(&item_id) && self.is_open(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rejects if `item_id` or any ancestor is already open, or any descendant
    /// is already open. On success marks `item_id` `LOCAL` and every descendant
    /// `CONTAINER` pointing at it, then emits an `Open` entry.
    pub fn open(&mut self, item_id: u64, domain_base: &str, start: i64, rate: u64) -> FluxResult<()> {
        if self.is_open(item_id)? {
            return Err(FluxError::AlreadyOpen);
        }
        if item_id != 0 {
            for ancestor in self.ancestors(item_id)? {
                if self.is_open(ancestor)? {
                    return Err(FluxError::AlreadyOpen);
                }
            }
        }
        if self.has_open_descendant(item_id)? || (item_id == 0 && self.any_item_open()?) {
            return Err(FluxError::ChildrenAlreadyOpen);
        }

        if self.dump_enabled {
            entry::write_open(self.buffer_mut()?, item_id, domain_base, start, rate)?;
        }

        if item_id == 0 {
            self.root_open = Open::Local(start);
        } else {
            self.item_mut(item_id)?.open = Open::Local(start);
        }
        for id in 1..=self.max_item_id {
            if id != item_id && self.ancestors(id)?.contains(&item_id) {
                self.item_mut(id)?.open = Open::Container(item_id);
            }
        }
        trace!("trace {}: opened item {item_id} at {start}", self.id);
        Ok(())
    }

    fn any_item_open(&self) -> FluxResult<bool> {
        for id in 1..=self.max_item_id {
            if self.is_open(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Requires `open = LOCAL` on `item_id`. Clamps `end` to at least
    /// `current + 1` (strict forward progress) and clears descendants back to
    /// `NONE` before emitting a `Close` entry.
    pub fn close(&mut self, item_id: u64, end: i64) -> FluxResult<()> {
        let current = match if item_id == 0 {
            self.root_open
        } else {
            self.item(item_id)?.open
        } {
            Open::Local(c) => c,
            _ => return Err(FluxError::InvalidOpenClose),
        };
        let end = end.max(current + 1);

        if self.dump_enabled {
            entry::write_close(self.buffer_mut()?, item_id, end)?;
        }

        if item_id == 0 {
            self.root_open = Open::None;
        } else {
            self.item_mut(item_id)?.open = Open::None;
        }
        for id in 1..=self.max_item_id {
            if id != item_id && self.ancestors(id)?.contains(&item_id) {
                self.item_mut(id)?.open = Open::None;
            }
        }
        trace!("trace {}: closed item {item_id} at {end}", self.id);
        Ok(())
    }

    // -- Writes at domain position (spec §4.E) -------------------------------

    fn current_owner(&self, item_id: u64) -> FluxResult<u64> {
        let open = if item_id == 0 {
            self.root_open
        } else {
            self.item(item_id)?.open
        };
        match open {
            Open::Local(_) => Ok(item_id),
            Open::Container(owner) => Ok(owner),
            Open::None => Err(FluxError::NotOpen),
        }
    }

    fn current_value(&self, owner_id: u64) -> i64 {
        match if owner_id == 0 {
            self.root_open
        } else {
            self.items[owner_id as usize - 1].open
        } {
            Open::Local(v) => v,
            _ => 0,
        }
    }

    fn set_current_value(&mut self, owner_id: u64, value: i64) {
        let open = if owner_id == 0 {
            &mut self.root_open
        } else {
            &mut self.items[owner_id as usize - 1].open
        };
        *open = Open::Local(value);
    }

    /// Resolves `current`, computes the non-negative wire delta, and returns
    /// `(owner_id, new_absolute_position, wire_delta)` or
    /// `POSITION_LESS_THAN_CURRENT` (spec §4.E steps 1-2).
    fn resolve_write(
        &self,
        item_id: u64,
        domain_position: i64,
        is_delta: bool,
    ) -> FluxResult<(u64, i64, Option<u64>)> {
        let owner = self.current_owner(item_id)?;
        let current = self.current_value(owner);
        let delta = if is_delta {
            domain_position
        } else {
            domain_position - current
        };
        if delta < 0 {
            return Err(FluxError::PositionLessThanCurrent);
        }
        let new_absolute = current + delta;
        let wire_delta = if delta == 0 { None } else { Some(delta as u64) };
        Ok((owner, new_absolute, wire_delta))
    }

    /// `WriteCurrent`: emits a `CURR` entry without a sample body; still
    /// participates in monotonicity (spec §4.E "Current-without-sample").
    pub fn write_current(
        &mut self,
        item_id: u64,
        domain_position: i64,
        is_delta: bool,
    ) -> FluxResult<()> {
        let (owner, new_absolute, _) = self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_current(self.buffer_mut()?, item_id, new_absolute)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_logic(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        preceding: LogicCode,
        states: &[LogicCode],
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_logic_sample(
                self.buffer_mut()?,
                item_id,
                conflict,
                wire_delta,
                states,
                preceding,
            )?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_integer(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        value: i64,
        width: usize,
        signed: bool,
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_integer_sample(
                self.buffer_mut()?,
                item_id,
                conflict,
                wire_delta,
                value,
                width,
                signed,
            )?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_float(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        value: f64,
        width: usize,
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_float_sample(self.buffer_mut()?, item_id, conflict, wire_delta, value, width)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_text(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        text: &str,
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_text_sample(self.buffer_mut()?, item_id, conflict, wire_delta, text)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_binary(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        bytes: &[u8],
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_binary_sample(self.buffer_mut()?, item_id, conflict, wire_delta, bytes)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_event(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        value: u64,
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_event_sample(self.buffer_mut()?, item_id, conflict, wire_delta, value)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }

    pub fn write_member_set(
        &mut self,
        item_id: u64,
        conflict: bool,
        domain_position: i64,
        is_delta: bool,
        members: &[MemberValue],
    ) -> FluxResult<()> {
        let (owner, new_absolute, wire_delta) =
            self.resolve_write(item_id, domain_position, is_delta)?;
        if self.dump_enabled {
            entry::write_member_set_sample(self.buffer_mut()?, item_id, conflict, wire_delta, members)?;
        }
        self.set_current_value(owner, new_absolute);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LinearBuffer;
    use crate::logic::{STATE_0, STATE_1};

    fn trace_with_buffer(max_item_id: u64) -> Trace<LinearBuffer> {
        let mut trace = Trace::new(0, 0, max_item_id, 4096);
        trace.set_buffer(LinearBuffer::new(4096)).unwrap();
        trace
    }

    #[test]
    fn scenario_2_minimal_signal_and_sample() {
        let mut trace = trace_with_buffer(2);
        trace.define_scope(1, 0, "top", "").unwrap();
        trace.define_signal(2, 1, "sig", "", SignalType::Logic, None).unwrap();
        trace.open(0, "ns", 0, 0).unwrap();
        trace
            .write_logic(2, false, 10, false, STATE_0, &[STATE_1])
            .unwrap();
    }

    #[test]
    fn scenario_3_monotonicity_violation_commits_nothing() {
        let mut trace = trace_with_buffer(2);
        trace.define_scope(1, 0, "top", "").unwrap();
        trace.define_signal(2, 1, "sig", "", SignalType::Logic, None).unwrap();
        trace.open(0, "ns", 0, 0).unwrap();
        trace
            .write_logic(2, false, 10, false, STATE_0, &[STATE_1])
            .unwrap();
        let result = trace.write_logic(2, false, 5, false, STATE_0, &[STATE_1]);
        assert!(matches!(result, Err(FluxError::PositionLessThanCurrent)));
    }

    #[test]
    fn scenario_6_open_propagation() {
        let mut trace = trace_with_buffer(5);
        trace.define_scope(1, 0, "a", "").unwrap();
        trace.define_scope(2, 1, "b", "").unwrap();
        trace.define_scope(3, 2, "c", "").unwrap();
        trace.define_signal(4, 2, "s4", "", SignalType::Event, None).unwrap();
        trace.define_signal(5, 3, "s5", "", SignalType::Event, None).unwrap();

        trace.open(2, "ns", 0, 0).unwrap();
        assert_eq!(trace.item(2).unwrap().open, Open::Local(0));
        assert_eq!(trace.item(3).unwrap().open, Open::Container(2));
        assert_eq!(trace.item(4).unwrap().open, Open::Container(2));
        assert_eq!(trace.item(5).unwrap().open, Open::Container(2));
        assert_eq!(trace.item(1).unwrap().open, Open::None);

        let result = trace.open(1, "ns", 0, 0);
        assert!(matches!(result, Err(FluxError::ChildrenAlreadyOpen)));
    }

    #[test]
    fn close_clamps_end_to_current_plus_one() {
        let mut trace = trace_with_buffer(1);
        trace.define_scope(1, 0, "a", "").unwrap();
        trace.open(1, "ns", 0, 0).unwrap();
        trace.write_current(1, 100, false).unwrap();
        // requested end (0) is behind current (100) + 1 -> clamped up.
        trace.close(1, 0).unwrap();
    }

    #[test]
    fn dump_disabled_skips_buffer_writes() {
        let mut trace = trace_with_buffer(1);
        trace.set_dump_enabled(false);
        trace.define_scope(1, 0, "a", "").unwrap();
        trace.open(1, "ns", 0, 0).unwrap();
        trace.write_current(1, 5, false).unwrap();
    }
}
