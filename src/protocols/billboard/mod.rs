// SPDX-License-Identifier: GPL-3.0-only
//! OSD protocol over the USB Billboard Device
//!
//! Requests are sent as vendor control transfers with a DDC/CI-like frame:
//!
//! ```text
//! 0x6E 0x51 (0x81 + body length) tag body...
//! ```
//!
//! `tag` is 0x01 for a read request (body: major[, minor]) and 0x03 for a
//! write (body: major, minor, value). Replies are fetched with a separate
//! device-to-host transfer and carry the value at offset 10.

mod device;

pub use device::{BillboardDevice, DriverGuard, KernelDriverControl};

use crate::error::{OsdError, Result};

/// bmRequestType for host-to-device vendor requests
pub const REQUEST_TYPE_OUT: u8 = 0x40;

/// bmRequestType for device-to-host vendor requests
pub const REQUEST_TYPE_IN: u8 = 0xc0;

/// bRequest carrying an OSD frame
pub const REQUEST_SEND: u8 = 178;

/// bRequest fetching the reply to a read request
pub const REQUEST_REPLY: u8 = 162;

/// wIndex of the reply transfer
pub const REPLY_INDEX: u16 = 111;

/// Size of a reply in bytes
pub const REPLY_LEN: usize = 12;

/// Offset of the value byte inside a reply
pub const REPLY_VALUE_OFFSET: usize = 10;

const FRAME_DEST: u8 = 0x6e;
const FRAME_SOURCE: u8 = 0x51;
const FRAME_LENGTH_BASE: u8 = 0x81;

const TAG_READ: u8 = 0x01;
const TAG_WRITE: u8 = 0x03;

fn encode_frame(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&[
        FRAME_DEST,
        FRAME_SOURCE,
        FRAME_LENGTH_BASE + body.len() as u8,
        tag,
    ]);
    frame.extend_from_slice(body);
    frame
}

/// Frame asking the monitor to prepare the value of an opcode
///
/// `args` is the major opcode, optionally followed by the minor one.
pub fn encode_read_request(args: &[u8]) -> Vec<u8> {
    debug_assert!(matches!(args.len(), 1 | 2));
    encode_frame(TAG_READ, args)
}

/// Frame writing `value` to an opcode
pub fn encode_write_request(major: u8, minor: u8, value: u8) -> Vec<u8> {
    encode_frame(TAG_WRITE, &[major, minor, value])
}

/// Extract the value byte from a reply
pub fn decode_reply(reply: &[u8]) -> Result<u8> {
    reply
        .get(REPLY_VALUE_OFFSET)
        .copied()
        .ok_or(OsdError::ShortReply {
            expected: REPLY_VALUE_OFFSET + 1,
            actual: reply.len(),
        })
}
