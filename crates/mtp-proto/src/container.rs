//! Bulk-pipe container framing and the small control-pipe payloads.

use binrw::prelude::*;
use std::io::Cursor;

use crate::codes::{ContainerType, ResponseCode};
use crate::writer::PayloadWriter;
use crate::{ProtoError, Result};

/// Every container opens with this 12-byte header.
pub const CONTAINER_HEADER_LEN: usize = 12;

/// `{u32 length, u16 type, u16 code, u32 transaction_id}`, little-endian.
///
/// The type field is kept raw so unknown kinds can be detected and stalled
/// instead of failing the parse.
#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub length: u32,
    pub kind: u16,
    pub code: u16,
    pub transaction_id: u32,
}

impl ContainerHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < CONTAINER_HEADER_LEN {
            return Err(ProtoError::TruncatedContainer(buf.len()));
        }
        Ok(Self::read(&mut Cursor::new(buf))?)
    }

    pub fn container_type(&self) -> Option<ContainerType> {
        ContainerType::from_u16(self.kind)
    }
}

/// Reads up to `max` u32 command parameters that follow the header. Missing
/// parameters stay zero, matching hosts that omit trailing ones.
pub fn parse_params(buf: &[u8], max: usize) -> [u32; 5] {
    let mut params = [0u32; 5];
    for (i, slot) in params.iter_mut().enumerate().take(max.min(5)) {
        let off = CONTAINER_HEADER_LEN + i * 4;
        if buf.len() >= off + 4 {
            *slot = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        }
    }
    params
}

/// Emits a response container: header plus 0..=5 u32 parameters.
pub fn write_response(
    w: &mut PayloadWriter<'_>,
    code: u16,
    transaction_id: u32,
    params: &[u32],
) -> u32 {
    let total = (CONTAINER_HEADER_LEN + params.len() * 4) as u32;
    let mut len = 0;
    len += w.u32(total);
    len += w.u16(ContainerType::Response as u16);
    len += w.u16(code);
    len += w.u32(transaction_id);
    for &p in params {
        len += w.u32(p);
    }
    len
}

/// Emits the data-container header for the handler currently streaming.
/// `total` is the length the measurement pass produced for the whole phase.
pub fn write_data_header(w: &mut PayloadWriter<'_>, code: u16, transaction_id: u32, total: u32) -> u32 {
    let mut len = 0;
    len += w.u32(total);
    len += w.u16(ContainerType::Data as u16);
    len += w.u16(code);
    len += w.u32(transaction_id);
    len
}

/// Payload of the class `CancelRequest`: `{u16 code, u32 transaction_id}`.
#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelPayload {
    pub code: u16,
    pub transaction_id: u32,
}

impl CancelPayload {
    pub const LEN: usize = 6;

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::LEN {
            return Err(ProtoError::TruncatedContainer(buf.len()));
        }
        Ok(Self::read(&mut Cursor::new(buf))?)
    }
}

/// Builds the 4-byte `GetDeviceStatus` reply `{u16 length, u16 code}`.
pub fn device_status(code: ResponseCode) -> [u8; 4] {
    let mut buf = [0u8; 4];
    let mut w = PayloadWriter::emit(0, &mut buf);
    w.u16(4);
    w.u16(code.into());
    buf
}

/// Builds the single-parameter interrupt event container. The session id
/// field is all-ones ("all sessions"), the transaction id zero.
pub fn event_container(code: u16, param: u32) -> [u8; 20] {
    let mut buf = [0u8; 20];
    let len = buf.len() as u32;
    let mut w = PayloadWriter::emit(0, &mut buf);
    w.u32(len);
    w.u16(ContainerType::Event as u16);
    w.u16(code);
    w.u32(u32::MAX);
    w.u32(0);
    w.u32(param);
    buf
}
