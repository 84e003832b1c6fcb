// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP frame parser and builder
//!
//! Pure functions over byte buffers; no I/O happens here. A frame is the
//! 7-byte MBAP header followed by the PDU (function code + data). The only
//! supported request is Read Holding Registers (0x03); every other function
//! code is answered with an exception frame rather than silently dropped.

use thiserror::Error;

/// Function code for Read Holding Registers.
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Exception code: illegal function.
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Exception code: illegal data value.
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Largest register count accepted per read request. The response byte
/// count is a single byte, so anything above 125 registers (250 data bytes)
/// could not be framed anyway.
pub const MAX_READ_COUNT: u16 = 125;

/// Minimum actionable frame: header plus function code.
pub const MIN_FRAME_LEN: usize = MbapHeader::SIZE + 1;

/// Complete read-registers request: header, function code, start address,
/// register count.
pub const READ_REQUEST_LEN: usize = MbapHeader::SIZE + 5;

/// MBAP header, the TCP-specific wrapper around every Modbus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Echoed verbatim so the client can match responses to requests.
    pub transaction_id: u16,
    /// Always 0x0000 for Modbus.
    pub protocol_id: u16,
    /// Number of bytes following this field (unit id + PDU).
    pub length: u16,
    /// Echoed verbatim.
    pub unit_id: u8,
}

impl MbapHeader {
    pub const SIZE: usize = 7;

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        })
    }

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.transaction_id.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.protocol_id.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.length.to_be_bytes());
        bytes[6] = self.unit_id;
        bytes
    }
}

/// A parsed Read Holding Registers request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub header: MbapHeader,
    pub start_address: u16,
    pub count: u16,
}

/// Ways an inbound frame can fail to parse.
///
/// `TooShort` and `ProtocolId` are malformations: the connection is dropped
/// without a response. The other variants carry the header so the server
/// can answer with a well-formed exception frame and keep the connection
/// open.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("invalid protocol id: 0x{0:04x}")]
    ProtocolId(u16),

    #[error("unsupported function code: 0x{code:02x}")]
    UnsupportedFunction { header: MbapHeader, code: u8 },

    #[error("register count out of range: {count}")]
    CountOutOfRange { header: MbapHeader, count: u16 },
}

/// Parse one complete frame into a typed read request.
///
/// Expects the full frame (header + PDU) as assembled by the connection
/// loop. Fewer than [`MIN_FRAME_LEN`] bytes is unconditionally too short;
/// a Read Holding Registers request additionally needs its address and
/// count fields, [`READ_REQUEST_LEN`] bytes in total.
pub fn parse_request(bytes: &[u8]) -> Result<ReadRequest, FrameError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }
    // Header presence was checked above; from_bytes cannot fail here.
    let header = match MbapHeader::from_bytes(bytes) {
        Some(header) => header,
        None => return Err(FrameError::TooShort(bytes.len())),
    };
    if header.protocol_id != 0 {
        return Err(FrameError::ProtocolId(header.protocol_id));
    }

    let function = bytes[MbapHeader::SIZE];
    if function != FC_READ_HOLDING_REGISTERS {
        return Err(FrameError::UnsupportedFunction {
            header,
            code: function,
        });
    }
    if bytes.len() < READ_REQUEST_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }

    let start_address = u16::from_be_bytes([bytes[8], bytes[9]]);
    let count = u16::from_be_bytes([bytes[10], bytes[11]]);
    if count == 0 || count > MAX_READ_COUNT {
        return Err(FrameError::CountOutOfRange { header, count });
    }

    Ok(ReadRequest {
        header,
        start_address,
        count,
    })
}

/// Build a Read Holding Registers success response.
///
/// Layout: header (length = 3 + 2×n), unit id, function code 0x03, byte
/// count, then each register big-endian.
pub fn build_read_response(transaction_id: u16, unit_id: u8, registers: &[u16]) -> Vec<u8> {
    let byte_count = registers.len() * 2;
    let header = MbapHeader {
        transaction_id,
        protocol_id: 0,
        length: (3 + byte_count) as u16,
        unit_id,
    };
    let mut frame = Vec::with_capacity(MbapHeader::SIZE + 2 + byte_count);
    frame.extend_from_slice(&header.to_bytes());
    frame.push(FC_READ_HOLDING_REGISTERS);
    frame.push(byte_count as u8);
    for register in registers {
        frame.extend_from_slice(&register.to_be_bytes());
    }
    frame
}

/// Build the fixed 9-byte exception response: the offending function code
/// with its high bit set, followed by one exception-code byte.
pub fn build_exception(transaction_id: u16, unit_id: u8, function: u8, exception: u8) -> [u8; 9] {
    let header = MbapHeader {
        transaction_id,
        protocol_id: 0,
        length: 3,
        unit_id,
    };
    let mut frame = [0u8; 9];
    frame[..MbapHeader::SIZE].copy_from_slice(&header.to_bytes());
    frame[7] = function | 0x80;
    frame[8] = exception;
    frame
}
