//! Ring-of-sections buffer (spec §3/§4.C): capacity pre-partitioned into N
//! fixed-size, independently headed sections, reused cyclically once `seccommit`
//! is called.

use crate::entry::Tag;
use crate::error::{FluxError, FluxResult};

pub const SECTION_HEADER_SIZE: usize = 7;

/// Invoked each time the ring advances into a fresh section, given a mutable view
/// over that section's content area (at most `section_total - SECTION_HEADER_SIZE`
/// bytes). Returns how many bytes it wrote, which become the section's initial
/// `used` count (spec §9 "ring initialization callback").
pub type SectionInit = Box<dyn FnMut(&mut [u8]) -> FluxResult<usize>>;

struct RingState {
    section_total: usize,
    section_count: usize,
    first: usize,
    current: usize,
    cursor: usize,
    init: SectionInit,
}

impl std::fmt::Debug for RingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingState")
            .field("section_total", &self.section_total)
            .field("section_count", &self.section_count)
            .field("first", &self.first)
            .field("current", &self.current)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct RingBuffer {
    arena: Vec<u8>,
    cap: usize,
    pos: usize,
    ring: Option<RingState>,
    bound_to_trace: bool,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: vec![0u8; capacity],
            cap: capacity,
            pos: 0,
            ring: None,
            bound_to_trace: false,
        }
    }

    pub(crate) fn bind_to_trace(&mut self) -> FluxResult<()> {
        if self.bound_to_trace {
            return Err(FluxError::AlreadyUsed);
        }
        self.bound_to_trace = true;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn is_sectioned(&self) -> bool {
        self.ring.is_some()
    }

    // --- Pre-SECCOMMIT: behaves like a linear buffer. ---

    pub fn cursor(&self) -> usize {
        self.pos
    }

    pub fn request(&mut self, n: usize) -> FluxResult<()> {
        match self.ring {
            None => {
                if self.pos + n > self.cap {
                    return Err(FluxError::Overflow);
                }
                Ok(())
            }
            Some(_) => self.request_in_section(n),
        }
    }

    pub fn commit(&mut self, bytes: &[u8]) -> FluxResult<()> {
        match self.ring {
            None => {
                if self.pos + bytes.len() > self.cap {
                    return Err(FluxError::Overflow);
                }
                self.arena[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
                self.pos += bytes.len();
                Ok(())
            }
            Some(_) => self.commit_in_section(bytes),
        }
    }

    pub fn clear(&mut self) {
        self.pos = 0;
        self.ring = None;
    }

    /// Writes the `section_count` raw section headers (counter left at 0 =
    /// "never written", `used` at 0, `len` set to the fixed content capacity) that
    /// `seccommit` will then freeze. Mirrors the reference's `WriteSectionEntries`.
    pub fn write_section_entries(
        &mut self,
        section_total: usize,
        section_count: usize,
    ) -> FluxResult<()> {
        if section_total <= SECTION_HEADER_SIZE {
            return Err(FluxError::InvalidValue);
        }
        let content_cap = (section_total - SECTION_HEADER_SIZE) as u16;
        for _ in 0..section_count {
            self.request(section_total)?;
            let mut header = [0u8; SECTION_HEADER_SIZE];
            header[0] = 0x00;
            header[1] = Tag::Sect as u8;
            header[2] = 0; // never written
            header[3..5].copy_from_slice(&content_cap.to_le_bytes());
            header[5..7].copy_from_slice(&0u16.to_le_bytes());
            self.commit(&header)?;
            let pad = vec![0u8; section_total - SECTION_HEADER_SIZE];
            self.commit(&pad)?;
        }
        Ok(())
    }

    /// Freezes the `section_count` sections written by
    /// [`write_section_entries`](Self::write_section_entries), entering section
    /// mode. `init` runs immediately for section 0, and again each time a write
    /// advances into a new section.
    pub fn seccommit(
        &mut self,
        section_total: usize,
        section_count: usize,
        init: SectionInit,
    ) -> FluxResult<()> {
        if self.ring.is_some() {
            return Err(FluxError::InvalidValue);
        }
        let span = section_total
            .checked_mul(section_count)
            .ok_or(FluxError::InvalidValue)?;
        if span > self.pos {
            return Err(FluxError::InvalidValue);
        }
        let first = self.pos - span;

        self.ring = Some(RingState {
            section_total,
            section_count,
            first,
            current: first,
            cursor: first + SECTION_HEADER_SIZE,
            init,
        });

        self.write_section_header(first, 0);
        let used = self.invoke_init(first)?;
        self.set_section_used(first, used);
        if let Some(ring) = self.ring.as_mut() {
            ring.cursor = first + SECTION_HEADER_SIZE + used;
        }
        Ok(())
    }

    fn section_index(&self, offset: usize, ring: &RingState) -> usize {
        (offset - ring.first) / ring.section_total
    }

    fn write_section_header(&mut self, section_start: usize, used: usize) {
        let ring = self.ring.as_ref().unwrap();
        let idx = self.section_index(section_start, ring);
        let is_last = idx == ring.section_count - 1;
        let content_cap = (ring.section_total - SECTION_HEADER_SIZE) as u16;

        let prev_counter = self.arena[section_start + 2] & 0x7f;
        let next_counter = match prev_counter {
            0 => 1,
            15 => 1,
            c => c + 1,
        };
        let counter_byte = if is_last {
            next_counter | 0x80
        } else {
            next_counter
        };

        self.arena[section_start] = 0x00;
        self.arena[section_start + 1] = Tag::Sect as u8;
        self.arena[section_start + 2] = counter_byte;
        self.arena[section_start + 3..section_start + 5].copy_from_slice(&content_cap.to_le_bytes());
        self.arena[section_start + 5..section_start + 7].copy_from_slice(&(used as u16).to_le_bytes());
    }

    fn set_section_used(&mut self, section_start: usize, used: usize) {
        self.arena[section_start + 5..section_start + 7].copy_from_slice(&(used as u16).to_le_bytes());
    }

    /// Calls the stored init callback on the content area of the section starting
    /// at `section_start`, via disjoint field borrows of `arena` and `ring`.
    fn invoke_init(&mut self, section_start: usize) -> FluxResult<usize> {
        let RingBuffer { arena, ring, .. } = self;
        let ring = ring.as_mut().ok_or(FluxError::InvalidValue)?;
        let content_cap = ring.section_total - SECTION_HEADER_SIZE;
        let start = section_start + SECTION_HEADER_SIZE;
        (ring.init)(&mut arena[start..start + content_cap])
    }

    fn request_in_section(&mut self, n: usize) -> FluxResult<()> {
        let ring = self.ring.as_ref().unwrap();
        let content_cap = ring.section_total - SECTION_HEADER_SIZE;
        let used = ring.cursor - (ring.current + SECTION_HEADER_SIZE);
        if used + n <= content_cap {
            return Ok(());
        }
        if n > content_cap {
            return Err(FluxError::Overflow);
        }
        self.advance_section()
    }

    fn commit_in_section(&mut self, bytes: &[u8]) -> FluxResult<()> {
        let ring = self.ring.as_ref().unwrap();
        let cursor = ring.cursor;
        let current = ring.current;
        self.arena[cursor..cursor + bytes.len()].copy_from_slice(bytes);
        let new_used = cursor + bytes.len() - (current + SECTION_HEADER_SIZE);
        self.set_section_used(current, new_used);
        if let Some(ring) = self.ring.as_mut() {
            ring.cursor += bytes.len();
        }
        Ok(())
    }

    fn advance_section(&mut self) -> FluxResult<()> {
        let (section_total, section_count, first, current) = {
            let ring = self.ring.as_ref().unwrap();
            (
                ring.section_total,
                ring.section_count,
                ring.first,
                ring.current,
            )
        };
        let last_offset = first + (section_count - 1) * section_total;
        let next = if current == last_offset {
            first
        } else {
            current + section_total
        };

        trace!("ring: advancing to section at offset {next}");
        self.write_section_header(next, 0);
        if let Some(ring) = self.ring.as_mut() {
            ring.current = next;
            ring.cursor = next + SECTION_HEADER_SIZE;
        }

        let used = self.invoke_init(next)?;
        self.set_section_used(next, used);
        if let Some(ring) = self.ring.as_mut() {
            ring.cursor = next + SECTION_HEADER_SIZE + used;
        }
        Ok(())
    }

    /// Returns the whole ring arena, for a reader to scan section-by-section.
    pub fn get(&self) -> &[u8] {
        &self.arena
    }

    /// Counter byte (with the last-section 0x80 bit, if applicable) of the section
    /// at physical index `idx`, for tests and readers.
    pub fn section_counter(&self, idx: usize) -> FluxResult<u8> {
        let ring = self.ring.as_ref().ok_or(FluxError::InvalidValue)?;
        let offset = ring.first + idx * ring.section_total;
        Ok(self.arena[offset + 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_writing_head(total: usize, count: usize) -> RingBuffer {
        let mut ring = RingBuffer::new(total * count);
        ring.write_section_entries(total, count).unwrap();
        ring.seccommit(
            total,
            count,
            Box::new(|slice| {
                let head = b"H";
                slice[..head.len()].copy_from_slice(head);
                Ok(head.len())
            }),
        )
        .unwrap();
        ring
    }

    #[test]
    fn seccommit_enters_section_mode() {
        let ring = ring_writing_head(64, 3);
        assert!(ring.is_sectioned());
        assert_eq!(ring.section_counter(0).unwrap() & 0x7f, 1);
    }

    #[test]
    fn last_section_carries_overflow_bit() {
        let ring = ring_writing_head(64, 3);
        assert_eq!(ring.section_counter(2).unwrap() & 0x80, 0x80);
        assert_eq!(ring.section_counter(0).unwrap() & 0x80, 0);
    }

    #[test]
    fn scenario_4_ring_recycle() {
        // spec.md §8 scenario 4: 3 sections of 256 bytes, write 700 bytes of
        // varied entries -> exactly two section advances (section 0 -> 1 -> 2),
        // landing in the last section with its counter at 1 and the 0x80 bit set.
        let mut ring = ring_writing_head(256, 3);
        let mut remaining = 700usize;
        while remaining > 0 {
            let chunk = remaining.min(40);
            ring.request(chunk).unwrap();
            ring.commit(&vec![0xab; chunk]).unwrap();
            remaining -= chunk;
        }
        assert_eq!(ring.section_counter(2).unwrap(), 1 | 0x80);
    }

    #[test]
    fn counter_wraps_from_fifteen_to_one() {
        let mut ring = ring_writing_head(32, 1);
        let content_cap = 32 - SECTION_HEADER_SIZE;
        for _ in 0..16 {
            ring.request(content_cap).unwrap();
            ring.commit(&vec![0u8; content_cap]).unwrap();
        }
        let counter = ring.section_counter(0).unwrap() & 0x7f;
        assert!((1..=15).contains(&counter));
        assert_ne!(counter, 0);
    }
}
