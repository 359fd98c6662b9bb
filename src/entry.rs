//! Entry writer (module D): typed record framing for every entry kind the core
//! emits. Every function here follows the same template (spec §4.D): compute an
//! upper-bound byte count, hand it to the buffer's REQUEST, write the fixed
//! `0x00, TAG` prefix plus body, then COMMIT exactly the bytes produced.

use crate::buffer::WriteTarget;
use crate::error::{FluxError, FluxResult};
use crate::logic::{self, LogicCode};
use crate::varint::{
    text_len, write_f32, write_f64, write_fixed_uvarint, write_ivarint, write_minimized_i64,
    write_minimized_u64, write_szdf, write_text, write_uvarint,
};

/// Closed enumeration of entry tags (spec §6). Every entry except a data sample
/// begins `0x00, TAG`; data samples are self-delimiting via their `itemId_tagged`
/// header instead (see [`write_logic_sample`] and friends).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
    Head = 0x01,
    Switch = 0x04,
    Pblk = 0x05,
    Sect = 0x06,
    ScopeDef = 0x10,
    SignalDef = 0x11,
    MultiSignalDef = 0x12,
    SignalReferenceDef = 0x13,
    ScatteredSignalDef = 0x14,
    ScatteredSignalReferenceDef = 0x15,
    Open = 0x20,
    Close = 0x21,
    DefaultDomain = 0x22,
    Current = 0x23,
    EnumDef = 0x30,
    MemberDef = 0x31,
    Relation = 0x40,
    Label = 0x41,
    ControlReq = 0x80,
    ControlRes = 0x81,
}

/// Per-item/per-sample type code (spec §4.D "signalType nibble", §4.D "df"),
/// grounded on the original `FLX_TYPE_*` constant family: item definitions use
/// the full set for their `signalType`; data samples reuse the same codes as
/// the generic format-byte low nibble, except logic-packed samples (which carry
/// no generic format byte at all — see [`write_logic_sample`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalType {
    Unknown = 0,
    Event = 1,
    Integer = 2,
    Logic = 3,
    Float = 4,
    Text = 5,
    Binary = 6,
    Struct = 7,
    EventArray = 8,
    IntegerArray = 9,
    FloatArray = 10,
    TextArray = 11,
}

/// Data-format code a logic-text sample's generic format byte carries. Chosen to
/// have an even low nibble so it can never be mistaken for a logic-pack header
/// byte, whose low nibble always has `PACK_RIGHT_ALIGNED` (an odd bit) set.
const LOGIC_TEXT_DF: u8 = 14;

/// `MemberValue.type` (spec §3), grounded on `FLX_STRUCTTYPE_*`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemberType {
    Unknown = 0,
    Text = 1,
    Enum = 2,
    Integer = 3,
    Float = 4,
    Binary = 6,
    LocalEnum = 7,
    MergeEnum = 8,
}

const MEMBER_TYPE_MOD_HIDDEN: u8 = 0x80;

/// The value carried by one [`MemberValue`].
#[derive(Clone, Debug)]
pub enum MemberData {
    Text(String),
    Integer(i64),
    Float32(f32),
    Float64(f64),
    Binary(Vec<u8>),
}

/// One field of a composite/struct value or control-message parameter (spec §3).
#[derive(Clone, Debug)]
pub struct MemberValue {
    pub member_id: u64,
    pub kind: MemberType,
    pub mod_hidden: bool,
    pub label: String,
    pub descriptor: String,
    pub data: MemberData,
    /// Integer-signed flag (spec §3 `option`).
    pub signed: bool,
    pub valid: bool,
}

fn write_entry_prefix(body: &mut Vec<u8>, tag: Tag) {
    body.push(0x00);
    body.push(tag as u8);
}

fn commit_entry<B: WriteTarget>(buf: &mut B, body: &[u8]) -> FluxResult<usize> {
    buf.request(body.len())?;
    buf.commit(body)?;
    Ok(body.len())
}

// ---------------------------------------------------------------------------
// Head / Switch
// ---------------------------------------------------------------------------

const FORMAT_MAGIC: &[u8; 4] = b"flux";
const FORMAT_VERSION: u8 = 4;

pub const MODE_NORMAL: u8 = 0;
pub const MODE_SYNC: u8 = 1;

/// `Head` (0x01): `"flux" | version | traceId | name | description | mode |
/// maxItemId | maxEntrySize`. Must be the first entry of a stream.
pub fn write_head<B: WriteTarget>(
    buf: &mut B,
    trace_id: u64,
    name: &str,
    description: &str,
    mode: u8,
    max_item_id: u64,
    max_entry_size: u64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(32 + name.len() + description.len());
    write_entry_prefix(&mut body, Tag::Head);
    body.extend_from_slice(FORMAT_MAGIC);
    body.push(FORMAT_VERSION);
    write_uvarint(&mut body, trace_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    body.push(mode);
    write_uvarint(&mut body, max_item_id);
    write_uvarint(&mut body, max_entry_size);
    commit_entry(buf, &body)
}

/// `Switch` (0x04): reserved for multi-trace multiplexed streams.
pub fn write_switch<B: WriteTarget>(buf: &mut B, trace_id: u64) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(11);
    write_entry_prefix(&mut body, Tag::Switch);
    write_uvarint(&mut body, trace_id);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Scope / signal / reference definitions
// ---------------------------------------------------------------------------

/// `ScopeDef` (0x10): `itemId | parentId | name | description`.
pub fn write_scope_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    parent_id: u64,
    name: &str,
    description: &str,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + name.len() + description.len());
    write_entry_prefix(&mut body, Tag::ScopeDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    commit_entry(buf, &body)
}

/// `SignalDef` (0x11): `itemId | parentId | name | description | signalType |
/// descriptor?` (descriptor present iff non-empty).
pub fn write_signal_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    parent_id: u64,
    name: &str,
    description: &str,
    signal_type: SignalType,
    descriptor: Option<&str>,
) -> FluxResult<usize> {
    let mut body =
        Vec::with_capacity(20 + name.len() + description.len() + descriptor.map_or(0, str::len));
    write_entry_prefix(&mut body, Tag::SignalDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    body.push(signal_type as u8);
    write_text(&mut body, descriptor.unwrap_or(""));
    commit_entry(buf, &body)
}

/// `MultiSignalDef` (0x12): like [`write_signal_def`] but defines several
/// contiguous item ids (e.g. a bus) in one entry, sharing name/description.
pub fn write_multi_signal_def<B: WriteTarget>(
    buf: &mut B,
    item_ids: &[u64],
    parent_id: u64,
    name: &str,
    description: &str,
    signal_type: SignalType,
    descriptor: Option<&str>,
) -> FluxResult<usize> {
    if item_ids.is_empty() {
        return Err(FluxError::InvalidValue);
    }
    let mut body = Vec::with_capacity(24 + item_ids.len() * 5 + name.len() + description.len());
    write_entry_prefix(&mut body, Tag::MultiSignalDef);
    write_uvarint(&mut body, item_ids.len() as u64);
    for &id in item_ids {
        write_uvarint(&mut body, id);
    }
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    body.push(signal_type as u8);
    write_text(&mut body, descriptor.unwrap_or(""));
    commit_entry(buf, &body)
}

/// `SignalReferenceDef` (0x13): projects an already-defined signal's sample
/// stream under an additional `itemId`/name without reserving a new stream.
pub fn write_signal_reference_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    parent_id: u64,
    name: &str,
    description: &str,
    referenced_item_id: u64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(24 + name.len() + description.len());
    write_entry_prefix(&mut body, Tag::SignalReferenceDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    write_uvarint(&mut body, referenced_item_id);
    commit_entry(buf, &body)
}

/// `ScatteredSignalDef` (0x14): a signal whose bits are a non-contiguous slice
/// of a wider source signal's word, `bit_width` bits starting at `bit_offset`.
#[allow(clippy::too_many_arguments)]
pub fn write_scattered_signal_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    parent_id: u64,
    name: &str,
    description: &str,
    signal_type: SignalType,
    descriptor: Option<&str>,
    source_item_id: u64,
    bit_offset: u32,
    bit_width: u32,
) -> FluxResult<usize> {
    let mut body =
        Vec::with_capacity(32 + name.len() + description.len() + descriptor.map_or(0, str::len));
    write_entry_prefix(&mut body, Tag::ScatteredSignalDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    body.push(signal_type as u8);
    write_text(&mut body, descriptor.unwrap_or(""));
    write_uvarint(&mut body, source_item_id);
    write_uvarint(&mut body, bit_offset as u64);
    write_uvarint(&mut body, bit_width as u64);
    commit_entry(buf, &body)
}

/// `ScatteredSignalReferenceDef` (0x15): the reference-def analogue of
/// [`write_scattered_signal_def`].
pub fn write_scattered_signal_reference_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    parent_id: u64,
    name: &str,
    description: &str,
    referenced_item_id: u64,
    source_item_id: u64,
    bit_offset: u32,
    bit_width: u32,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(32 + name.len() + description.len());
    write_entry_prefix(&mut body, Tag::ScatteredSignalReferenceDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, parent_id);
    write_text(&mut body, name);
    write_text(&mut body, description);
    write_uvarint(&mut body, referenced_item_id);
    write_uvarint(&mut body, source_item_id);
    write_uvarint(&mut body, bit_offset as u64);
    write_uvarint(&mut body, bit_width as u64);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Open / close / domain
// ---------------------------------------------------------------------------

/// `Open` (0x20): `itemId (0 = whole trace) | domainBase | start | rate`.
pub fn write_open<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    domain_base: &str,
    start: i64,
    rate: u64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(24 + domain_base.len());
    write_entry_prefix(&mut body, Tag::Open);
    write_uvarint(&mut body, item_id);
    write_text(&mut body, domain_base);
    write_minimized_i64(&mut body, start, 8, true);
    write_uvarint(&mut body, rate);
    commit_entry(buf, &body)
}

/// `Close` (0x21): `itemId | end`.
pub fn write_close<B: WriteTarget>(buf: &mut B, item_id: u64, end: i64) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(20);
    write_entry_prefix(&mut body, Tag::Close);
    write_uvarint(&mut body, item_id);
    write_minimized_i64(&mut body, end, 8, true);
    commit_entry(buf, &body)
}

/// `DefaultDomain` (0x22): `text`.
pub fn write_default_domain<B: WriteTarget>(buf: &mut B, domain_base: &str) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(4 + domain_base.len());
    write_entry_prefix(&mut body, Tag::DefaultDomain);
    write_text(&mut body, domain_base);
    commit_entry(buf, &body)
}

/// `Current` (0x23): `itemId | absolute domain position`, no sample body.
pub fn write_current<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    position: i64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(20);
    write_entry_prefix(&mut body, Tag::Current);
    write_uvarint(&mut body, item_id);
    write_minimized_i64(&mut body, position, 8, true);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Enum / member definitions, relation / label
// ---------------------------------------------------------------------------

/// `EnumDef` (0x30): `itemId | enumDomainCode | label | value`.
pub fn write_enum_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    enum_domain_code: u8,
    label: &str,
    value: i64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + label.len());
    write_entry_prefix(&mut body, Tag::EnumDef);
    write_uvarint(&mut body, item_id);
    body.push(enum_domain_code);
    write_text(&mut body, label);
    write_ivarint(&mut body, value);
    commit_entry(buf, &body)
}

/// `MemberDef` (0x31): `itemId | memberId | label | type | descriptor`.
pub fn write_member_def<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    member_id: u64,
    label: &str,
    kind: MemberType,
    descriptor: &str,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(20 + label.len() + descriptor.len());
    write_entry_prefix(&mut body, Tag::MemberDef);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, member_id);
    write_text(&mut body, label);
    body.push(kind as u8);
    write_text(&mut body, descriptor);
    commit_entry(buf, &body)
}

/// `Relation` (0x40): `itemId | targetItemId | style | delta`. Attaches a typed
/// relation from `item_id`'s most recent sample to `target_item_id`'s, `delta`
/// carrying the signed domain offset between the two (4-byte signed minimized).
pub fn write_relation<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    target_item_id: u64,
    style: u64,
    delta: i64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(20);
    write_entry_prefix(&mut body, Tag::Relation);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, target_item_id);
    write_uvarint(&mut body, style);
    write_minimized_i64(&mut body, delta, 4, true);
    commit_entry(buf, &body)
}

/// `Label` (0x41): `itemId | style | x | y`. Positions a styled marker relative
/// to `item_id`'s most recent sample; `x`/`y` are signed 4-byte minimized
/// coordinates, not text — a label's displayed text comes from `style`'s
/// definition, not this entry.
pub fn write_label<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    style: u64,
    x: i64,
    y: i64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(20);
    write_entry_prefix(&mut body, Tag::Label);
    write_uvarint(&mut body, item_id);
    write_uvarint(&mut body, style);
    write_minimized_i64(&mut body, x, 4, true);
    write_minimized_i64(&mut body, y, 4, true);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Compressed / section blocks
// ---------------------------------------------------------------------------

/// `Pblk` (0x05): `mode | originalSize | compressedSize | payload` (spec §6).
/// Shared by [`crate::buffer::sink::CompressSink`] so the wire bytes come from
/// one place.
pub fn write_pblk<B: WriteTarget>(
    buf: &mut B,
    mode: u8,
    original_size: u64,
    payload: &[u8],
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + payload.len());
    write_entry_prefix(&mut body, Tag::Pblk);
    body.push(mode);
    write_uvarint(&mut body, original_size);
    write_uvarint(&mut body, payload.len() as u64);
    body.extend_from_slice(payload);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Control request / response
// ---------------------------------------------------------------------------

fn write_member_tuple(body: &mut Vec<u8>, member: &MemberValue) {
    write_uvarint(body, member.member_id);
    let mut type_byte = member.kind as u8;
    if member.mod_hidden {
        type_byte |= MEMBER_TYPE_MOD_HIDDEN;
    }
    body.push(type_byte);
    match &member.data {
        MemberData::Text(s) => write_text(body, s),
        MemberData::Integer(v) => {
            if member.signed {
                write_minimized_i64(body, *v, 8, true);
            } else {
                write_minimized_u64(body, *v as u64, 8, true);
            }
        }
        MemberData::Float32(v) => {
            write_uvarint(body, 4);
            write_f32(body, *v);
        }
        MemberData::Float64(v) => {
            write_uvarint(body, 8);
            write_f64(body, *v);
        }
        MemberData::Binary(bytes) => {
            write_uvarint(body, bytes.len() as u64);
            body.extend_from_slice(bytes);
        }
    }
}

fn control_body(tag: Tag, control_id: u64, message_id: u64, members: &[MemberValue]) -> Vec<u8> {
    let valid: Vec<&MemberValue> = members.iter().filter(|m| m.valid).collect();
    let mut body = Vec::with_capacity(16 + valid.len() * 16);
    write_entry_prefix(&mut body, tag);
    write_uvarint(&mut body, control_id);
    write_uvarint(&mut body, message_id);
    write_uvarint(&mut body, valid.len() as u64);
    for member in valid {
        write_member_tuple(&mut body, member);
    }
    body
}

/// `ControlReq` (0x80): `controlId | messageId | count | count member tuples`,
/// no outer length prefix (the `count` is the boundary).
pub fn write_control_req<B: WriteTarget>(
    buf: &mut B,
    control_id: u64,
    message_id: u64,
    members: &[MemberValue],
) -> FluxResult<usize> {
    let body = control_body(Tag::ControlReq, control_id, message_id, members);
    commit_entry(buf, &body)
}

/// `ControlRes` (0x81): identical shape to [`write_control_req`].
pub fn write_control_res<B: WriteTarget>(
    buf: &mut B,
    control_id: u64,
    message_id: u64,
    members: &[MemberValue],
) -> FluxResult<usize> {
    let body = control_body(Tag::ControlRes, control_id, message_id, members);
    commit_entry(buf, &body)
}

// ---------------------------------------------------------------------------
// Data samples
// ---------------------------------------------------------------------------

/// Builds the common `itemId_tagged` header, optional delta varint. Does not
/// emit the leading `0x00`: data samples are self-delimited by this header's
/// value alone (always `>= 8` since `itemId >= 1`), distinguishing them from
/// the `0x00`-prefixed meta entries above (spec §3, §6).
fn write_sample_header(body: &mut Vec<u8>, item_id: u64, conflict: bool, delta: Option<u64>) {
    let mut tagged = item_id << 3;
    if conflict {
        tagged |= 1;
    }
    if delta.is_some() {
        tagged |= 2;
    }
    write_uvarint(body, tagged);
    if let Some(d) = delta {
        write_uvarint(body, d);
    }
}

/// No-value sample (df = [`SignalType::Unknown`], spec §4.D "none (df=0)").
pub fn write_none_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(12);
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(&mut body, 0, SignalType::Unknown as u8);
    commit_entry(buf, &body)
}

/// Integer sample, minimized to its smallest representation (spec §9 "does not
/// tighten" — any `width` is accepted for the scalar path).
pub fn write_integer_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    value: i64,
    width: usize,
    signed: bool,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + width);
    write_sample_header(&mut body, item_id, conflict, delta);
    let mut payload = Vec::with_capacity(width);
    if signed {
        write_minimized_i64(&mut payload, value, width, false);
    } else {
        write_minimized_u64(&mut payload, value as u64, width, false);
    }
    write_szdf(&mut body, payload.len() as u64, SignalType::Integer as u8);
    body.extend_from_slice(&payload);
    commit_entry(buf, &body)
}

/// Integer-array sample. `width` must be 4 or 8 (spec §9 open question: unlike
/// the scalar path, the array path does not accept arbitrary widths).
pub fn write_integer_array_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    values: &[i64],
    width: usize,
    signed: bool,
) -> FluxResult<usize> {
    if width != 4 && width != 8 {
        return Err(FluxError::InvalidDataSize);
    }
    let mut body = Vec::with_capacity(16 + values.len() * width);
    write_sample_header(&mut body, item_id, conflict, delta);

    let element_total = (1 + width) * values.len();
    let reserve = crate::varint::intlen(element_total as u64) + 1;
    write_fixed_uvarint(&mut body, 0, reserve);
    let patch_at = body.len() - reserve;

    let mut payload = Vec::with_capacity(element_total);
    for &v in values {
        if signed {
            write_minimized_i64(&mut payload, v, width, true);
        } else {
            write_minimized_u64(&mut payload, v as u64, width, true);
        }
    }
    let header_value = ((payload.len() as u64) << 4) | u64::from(SignalType::IntegerArray as u8);
    let mut patched = Vec::with_capacity(reserve);
    write_fixed_uvarint(&mut patched, header_value, reserve);
    body[patch_at..patch_at + reserve].copy_from_slice(&patched);
    body.extend_from_slice(&payload);

    commit_entry(buf, &body)
}

/// Float sample, `width` 4 or 8, no minimization.
pub fn write_float_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    value: f64,
    width: usize,
) -> FluxResult<usize> {
    if width != 4 && width != 8 {
        return Err(FluxError::InvalidDataSize);
    }
    let mut body = Vec::with_capacity(16 + width);
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(&mut body, width as u64, SignalType::Float as u8);
    if width == 4 {
        write_f32(&mut body, value as f32);
    } else {
        write_f64(&mut body, value);
    }
    commit_entry(buf, &body)
}

/// Float-array sample, `width` 4 or 8.
pub fn write_float_array_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    values: &[f64],
    width: usize,
) -> FluxResult<usize> {
    if width != 4 && width != 8 {
        return Err(FluxError::InvalidDataSize);
    }
    let mut body = Vec::with_capacity(16 + values.len() * width);
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(
        &mut body,
        (values.len() * width) as u64,
        SignalType::FloatArray as u8,
    );
    for &v in values {
        if width == 4 {
            write_f32(&mut body, v as f32);
        } else {
            write_f64(&mut body, v);
        }
    }
    commit_entry(buf, &body)
}

/// Event sample: a bare unsigned varint (spec §4.D).
pub fn write_event_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    value: u64,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16);
    write_sample_header(&mut body, item_id, conflict, delta);
    let mut payload = Vec::new();
    write_uvarint(&mut payload, value);
    write_szdf(&mut body, payload.len() as u64, SignalType::Event as u8);
    body.extend_from_slice(&payload);
    commit_entry(buf, &body)
}

/// Event-array sample. Per spec §9 open question, this reuses the scalar
/// [`SignalType::Event`] data-format code unconditionally rather than
/// [`SignalType::EventArray`] — preserved exactly for wire compatibility.
pub fn write_event_array_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    values: &[u64],
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + values.len() * 2);
    write_sample_header(&mut body, item_id, conflict, delta);
    let mut payload = Vec::new();
    for &v in values {
        write_uvarint(&mut payload, v);
    }
    write_szdf(&mut body, payload.len() as u64, SignalType::Event as u8);
    body.extend_from_slice(&payload);
    commit_entry(buf, &body)
}

/// Text sample.
pub fn write_text_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    text: &str,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + text.len());
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(&mut body, text_len(text) as u64, SignalType::Text as u8);
    write_text(&mut body, text);
    commit_entry(buf, &body)
}

/// Binary sample.
pub fn write_binary_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    bytes: &[u8],
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + bytes.len());
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(&mut body, bytes.len() as u64, SignalType::Binary as u8);
    body.extend_from_slice(bytes);
    commit_entry(buf, &body)
}

/// Logic-states-packed sample (spec §8 scenario 2). Carries no generic format
/// byte of its own: [`logic::pack`]'s own varint header occupies that slot,
/// since the receiver already knows the item is `Logic`-typed from its
/// definition and the pack header's low nibble has no room left for a second
/// type tag.
pub fn write_logic_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    states: &[LogicCode],
    preceding: LogicCode,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + states.len() / 2 + 2);
    write_sample_header(&mut body, item_id, conflict, delta);
    logic::pack(&mut body, states, preceding)?;
    commit_entry(buf, &body)
}

/// Logic-text sample: raw logic-value text, carrying an explicit
/// [`LOGIC_TEXT_DF`] format byte so it is distinguishable on the wire from a
/// packed-logic sample.
pub fn write_logic_text_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    text: &str,
) -> FluxResult<usize> {
    let mut body = Vec::with_capacity(16 + text.len());
    write_sample_header(&mut body, item_id, conflict, delta);
    write_szdf(&mut body, text_len(text) as u64, LOGIC_TEXT_DF);
    write_text(&mut body, text);
    commit_entry(buf, &body)
}

/// Member-set ("struct") sample: `{count, for each valid member: memberId |
/// type byte | payload}`, length-prefixed with the fixed-width varint
/// back-patch trick when embedded in a sample (spec §4.D).
pub fn write_member_set_sample<B: WriteTarget>(
    buf: &mut B,
    item_id: u64,
    conflict: bool,
    delta: Option<u64>,
    members: &[MemberValue],
) -> FluxResult<usize> {
    let valid: Vec<&MemberValue> = members.iter().filter(|m| m.valid).collect();

    let mut payload = Vec::new();
    write_uvarint(&mut payload, valid.len() as u64);
    for member in &valid {
        write_member_tuple(&mut payload, member);
    }

    let mut body = Vec::with_capacity(16 + payload.len());
    write_sample_header(&mut body, item_id, conflict, delta);

    let reserve = crate::varint::intlen(payload.len() as u64) + 1;
    let header_value = ((payload.len() as u64) << 4) | u64::from(SignalType::Struct as u8);
    write_fixed_uvarint(&mut body, header_value, reserve);
    body.extend_from_slice(&payload);

    commit_entry(buf, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LinearBuffer;
    use crate::logic::{STATE_0, STATE_1};

    #[test]
    fn scenario_1_head_round_trip() {
        let mut buf = LinearBuffer::new(4096);
        write_head(&mut buf, 0, "probe", "t", MODE_NORMAL, 0, 0x0fff).unwrap();
        let expected: &[u8] = &[
            0x00, 0x01, 0x66, 0x6c, 0x75, 0x78, 0x04, 0x00, 0x05, 0x70, 0x72, 0x6f, 0x62, 0x65,
            0x01, 0x74, 0x00, 0x00, 0xff, 0x1f,
        ];
        assert_eq!(buf.get(), expected);
    }

    #[test]
    fn scenario_2_sample_header_and_payload() {
        let mut buf = LinearBuffer::new(256);
        write_logic_sample(&mut buf, 2, false, Some(10), &[STATE_1], STATE_0).unwrap();
        assert_eq!(buf.get(), &[0x12, 0x0a, 0x11, 0x01]);
    }

    #[test]
    fn control_round_trip_matches_scenario_5() {
        let mut buf = LinearBuffer::new(64);
        write_control_req(&mut buf, 1, 2, &[]).unwrap();
        assert_eq!(buf.get(), &[0x00, 0x80, 0x01, 0x02, 0x00]);

        buf.clear();
        write_control_res(&mut buf, 1, 2, &[]).unwrap();
        assert_eq!(buf.get(), &[0x00, 0x81, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn integer_sample_minimizes_value() {
        let mut buf = LinearBuffer::new(64);
        write_integer_sample(&mut buf, 1, false, None, 5, 8, false).unwrap();
        // header (1<<3)=0x08, no delta, szdf=(1<<4)|Integer(2)=0x12, payload 0x05
        assert_eq!(buf.get(), &[0x08, 0x12, 0x05]);
    }

    #[test]
    fn text_sample_round_trip_shape() {
        let mut buf = LinearBuffer::new(64);
        write_text_sample(&mut buf, 3, false, None, "ok").unwrap();
        let bytes = buf.get();
        assert_eq!(bytes[0], 3 << 3);
        // szdf byte: size=text_len("ok")=1+2=3, df=Text(5) -> (3<<4)|5 = 0x35
        assert_eq!(bytes[1], 0x35);
        assert_eq!(&bytes[2..], &[2, b'o', b'k']);
    }
}
