//! Control parser (module F): reads control-request/response records from an
//! input byte stream and demultiplexes parameters to a user-registered
//! handler (spec §4.F).

use crate::buffer::sink::{SinkCommand, SinkHandle};
use crate::buffer::LinearBuffer;
use crate::entry::MemberType;
use crate::error::{FluxError, FluxResult};
use crate::varint::read_uvarint;

/// The three commands a [`ControlHandler`] is driven with, matching the
/// original `FLX_CONTROL_HANDLE_*` constants (`ENTER_MESSAGE=0`,
/// `PARSE_PARAMETER=1`, `LEAVE_MESSAGE=2`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerCommand {
    EnterMessage = 0,
    ParseParameter = 1,
    LeaveMessage = 2,
}

/// Whether the entry being parsed is a `ControlReq` or `ControlRes` (spec §6:
/// both share the same body shape).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageDirection {
    Request,
    Response,
}

/// A parameter value decoded from the wire, handed to
/// [`ControlHandler::parameter`].
#[derive(Clone, Debug)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
}

/// What the handler wants done with one parameter, decided from its
/// `memberId`/`type` alone, before the value bytes are read (spec §4.F step 3:
/// "If the handler returns OK and provides a non-null value and compatible
/// size, decode... otherwise skip").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamAccept {
    Skip,
    Integer { signed: bool },
    Float,
    Text,
    Binary,
}

/// User-registered callback, expected to use static per-controller storage
/// initialized on `ENTER_MESSAGE` to accumulate parameters, then react on
/// `LEAVE_MESSAGE` (spec §4.F "Handler callback registration").
pub trait ControlHandler {
    fn enter_message(&mut self, direction: MessageDirection, control_id: u64, message_id: u64);

    fn accept_parameter(
        &mut self,
        control_id: u64,
        message_id: u64,
        member_id: u64,
        kind: MemberType,
    ) -> ParamAccept;

    fn parameter(&mut self, control_id: u64, message_id: u64, member_id: u64, value: ParamValue);

    fn leave_message(&mut self, direction: MessageDirection, control_id: u64, message_id: u64);
}

const TAG_CONTROL_REQ: u8 = 0x80;
const TAG_CONTROL_RES: u8 = 0x81;

/// Drains control entries out of a [`LinearBuffer`] on flush, dispatching to a
/// [`ControlHandler`]. Intended as the buffer's sink handle for an inbound
/// control stream (spec §4.F).
pub struct ControlParser<H: ControlHandler> {
    handler: H,
}

impl<H: ControlHandler> ControlParser<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Parses as many complete entries as `data` contains, dispatching each to
    /// the handler. Returns the number of bytes consumed; a truncated trailing
    /// entry is left unconsumed (spec §4.F "NEED_MORE_DATA").
    fn parse_all(&mut self, data: &[u8]) -> FluxResult<usize> {
        let mut pos = 0;
        loop {
            if pos == data.len() {
                return Ok(pos);
            }
            match self.try_parse_one(&data[pos..])? {
                Some(n) => pos += n,
                None => return Ok(pos),
            }
        }
    }

    fn try_parse_one(&mut self, data: &[u8]) -> FluxResult<Option<usize>> {
        if data.is_empty() {
            return Ok(None);
        }
        if data[0] != 0x00 {
            warn!("control parser: expected entry prefix 0x00, got {:#04x}", data[0]);
            return Err(FluxError::CommandParseError);
        }
        let Some(&tag) = data.get(1) else {
            return Ok(None);
        };
        let direction = match tag {
            TAG_CONTROL_REQ => MessageDirection::Request,
            TAG_CONTROL_RES => MessageDirection::Response,
            _ => {
                warn!("control parser: unrecognized entry tag {tag:#04x}");
                return Err(FluxError::CommandParseError);
            }
        };
        self.parse_message(direction, &data[2..]).map(|n| n.map(|n| n + 2))
    }

    fn parse_message(
        &mut self,
        direction: MessageDirection,
        data: &[u8],
    ) -> FluxResult<Option<usize>> {
        let mut pos = 0;

        let Some((control_id, n)) = read_uvarint(&data[pos..]) else {
            return Ok(None);
        };
        pos += n;
        let Some((message_id, n)) = read_uvarint(&data[pos..]) else {
            return Ok(None);
        };
        pos += n;
        let Some((count, n)) = read_uvarint(&data[pos..]) else {
            return Ok(None);
        };
        pos += n;

        self.handler.enter_message(direction, control_id, message_id);

        for _ in 0..count {
            let Some((member_id, n)) = read_uvarint(&data[pos..]) else {
                return Ok(None);
            };
            pos += n;
            let Some(&type_byte) = data.get(pos) else {
                return Ok(None);
            };
            pos += 1;
            let kind = member_type_from_byte(type_byte)?;

            // Every member kind, including Float, is a varint size followed by
            // that many bytes (spec §4.A szDf convention).
            let Some((size, n)) = read_uvarint(&data[pos..]) else {
                return Ok(None);
            };
            let value_start = pos + n;
            if data.len() < value_start + size as usize {
                return Ok(None);
            }
            pos = value_start;
            let payload_end = pos + size as usize;
            let payload = &data[pos..payload_end];

            let accept = self
                .handler
                .accept_parameter(control_id, message_id, member_id, kind);
            if let Some(value) = decode_param(accept, payload)? {
                self.handler.parameter(control_id, message_id, member_id, value);
            }

            pos = payload_end;
        }

        self.handler.leave_message(direction, control_id, message_id);
        Ok(Some(pos))
    }
}

fn member_type_from_byte(byte: u8) -> FluxResult<MemberType> {
    Ok(match byte & 0x0f {
        0 => MemberType::Unknown,
        1 => MemberType::Text,
        2 => MemberType::Enum,
        3 => MemberType::Integer,
        4 => MemberType::Float,
        6 => MemberType::Binary,
        7 => MemberType::LocalEnum,
        8 => MemberType::MergeEnum,
        _ => return Err(FluxError::CommandParseError),
    })
}

fn decode_param(accept: ParamAccept, payload: &[u8]) -> FluxResult<Option<ParamValue>> {
    match accept {
        ParamAccept::Skip => Ok(None),
        ParamAccept::Integer { signed } => {
            let mut raw = [0u8; 8];
            if payload.len() > 8 {
                return Err(FluxError::InvalidDataSize);
            }
            raw[..payload.len()].copy_from_slice(payload);
            let fill = if signed && payload.last().is_some_and(|b| b & 0x80 != 0) {
                0xff
            } else {
                0
            };
            for b in raw.iter_mut().skip(payload.len()) {
                *b = fill;
            }
            let value = i64::from_le_bytes(raw);
            Ok(Some(ParamValue::Integer(value)))
        }
        ParamAccept::Float => {
            if payload.len() == 4 {
                let bytes: [u8; 4] = payload.try_into().unwrap();
                Ok(Some(ParamValue::Float(f32::from_le_bytes(bytes) as f64)))
            } else if payload.len() == 8 {
                let bytes: [u8; 8] = payload.try_into().unwrap();
                Ok(Some(ParamValue::Float(f64::from_le_bytes(bytes))))
            } else {
                Err(FluxError::InvalidDataSize)
            }
        }
        ParamAccept::Text => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| FluxError::InvalidValue)?
                .to_owned();
            Ok(Some(ParamValue::Text(text)))
        }
        ParamAccept::Binary => Ok(Some(ParamValue::Binary(payload.to_vec()))),
    }
}

impl<H: ControlHandler> std::fmt::Debug for ControlParser<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlParser").finish_non_exhaustive()
    }
}

impl<H: ControlHandler> SinkHandle for ControlParser<H> {
    fn handle(&mut self, _command: SinkCommand, bytes: &[u8]) -> FluxResult<usize> {
        self.parse_all(bytes)
    }
}

/// Frame-level framing (spec §4.F, §6 "Control framing (inbound)"): one byte
/// whose high bit requests an immediate flush and whose low seven bits give a
/// payload length (0..127), followed by that many bytes.
pub fn feed_frame(buffer: &mut LinearBuffer, frame_header: u8, payload: &[u8]) -> FluxResult<()> {
    let flush = frame_header & 0x80 != 0;
    let declared_len = (frame_header & 0x7f) as usize;
    if declared_len != payload.len() {
        return Err(FluxError::InvalidDataSize);
    }
    buffer.request(payload.len())?;
    buffer.commit(payload)?;
    if flush {
        buffer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{write_control_req, write_control_res};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingHandler {
        entered: Rc<RefCell<Vec<(u64, u64)>>>,
        left: Rc<RefCell<Vec<(u64, u64)>>>,
    }

    impl ControlHandler for RecordingHandler {
        fn enter_message(&mut self, _direction: MessageDirection, control_id: u64, message_id: u64) {
            self.entered.borrow_mut().push((control_id, message_id));
        }

        fn accept_parameter(
            &mut self,
            _control_id: u64,
            _message_id: u64,
            _member_id: u64,
            _kind: MemberType,
        ) -> ParamAccept {
            ParamAccept::Skip
        }

        fn parameter(&mut self, _control_id: u64, _message_id: u64, _member_id: u64, _value: ParamValue) {}

        fn leave_message(&mut self, _direction: MessageDirection, control_id: u64, message_id: u64) {
            self.left.borrow_mut().push((control_id, message_id));
        }
    }

    #[test]
    fn scenario_5_control_round_trip() {
        let mut req_bytes = Vec::new();
        {
            let mut scratch = LinearBuffer::new(64);
            write_control_req(&mut scratch, 1, 2, &[]).unwrap();
            req_bytes.extend_from_slice(scratch.get());
        }
        assert_eq!(req_bytes, vec![0x00, 0x80, 0x01, 0x02, 0x00]);

        let handler = RecordingHandler::default();
        let entered = handler.entered.clone();
        let left = handler.left.clone();
        let mut parser = ControlParser::new(handler);
        let mut buffer = LinearBuffer::new(64);

        buffer.request(req_bytes.len()).unwrap();
        buffer.commit(&req_bytes).unwrap();
        // directly exercise the sink contract rather than routing through
        // `feed_frame`, since the buffer here has no sink installed.
        let consumed = parser.handle(SinkCommand::Flush, buffer.get()).unwrap();
        assert_eq!(consumed, req_bytes.len());
        assert_eq!(&*entered.borrow(), &[(1, 2)]);
        assert_eq!(&*left.borrow(), &[(1, 2)]);

        let mut res_bytes = Vec::new();
        let mut scratch = LinearBuffer::new(64);
        write_control_res(&mut scratch, 1, 2, &[]).unwrap();
        res_bytes.extend_from_slice(scratch.get());
        assert_eq!(res_bytes, vec![0x00, 0x81, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn truncated_entry_consumes_nothing() {
        let handler = RecordingHandler::default();
        let mut parser = ControlParser::new(handler);
        let partial = [0x00, 0x80, 0x01];
        let consumed = parser.handle(SinkCommand::Flush, &partial).unwrap();
        assert_eq!(consumed, 0);
    }

    #[test]
    fn unknown_leading_byte_is_a_parse_error() {
        let handler = RecordingHandler::default();
        let mut parser = ControlParser::new(handler);
        let bogus = [0x01, 0x02, 0x03];
        assert!(matches!(
            parser.handle(SinkCommand::Flush, &bogus),
            Err(FluxError::CommandParseError)
        ));
    }
}
