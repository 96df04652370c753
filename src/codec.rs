/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::consts::MAX_FRAME_LENGTH;
use crate::dice::RollVector;
use crate::error::TowerError;
use bytes::{Buf, BufMut, BytesMut};
use integer_encoding::VarInt;
use tokio_util::codec::{Decoder, Encoder};

pub const OPCODE_ROLL: u8 = 0x01;

/// Longest LEB128 encoding of a u64.
const MAX_HEADER_LENGTH: usize = 10;

/// Commands understood by the tower firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Roll(RollVector),
}

impl Command {
    /// Frame body, without the length header.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            Command::Roll(roll) => {
                let mut payload = Vec::with_capacity(1 + roll.as_bytes().len());
                payload.push(OPCODE_ROLL);
                payload.extend_from_slice(roll.as_bytes());
                payload
            }
        }
    }
}

/// Varint length-prefixed framing used on both BLE and serial links.
#[derive(Default)]
pub struct TowerCodec;

impl Decoder for TowerCodec {
    type Item = Vec<u8>;
    type Error = TowerError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Vec<u8>>, TowerError> {
        match u64::decode_var(&buf[..]) {
            Some((len, consumed)) => {
                if len as usize > MAX_FRAME_LENGTH {
                    return Err(TowerError::DataTooLarge(len as usize));
                }

                if buf.len() >= len as usize + consumed {
                    buf.advance(consumed);
                    Ok(Some(buf.split_to(len as usize).to_vec()))
                } else {
                    Ok(None)
                }
            }
            // Garbage with the continuation bit set would otherwise buffer forever.
            None if buf.len() >= MAX_HEADER_LENGTH => Err(TowerError::IOFailure(
                "malformed frame header".to_string(),
            )),
            None => Ok(None),
        }
    }
}

impl Encoder<&[u8]> for TowerCodec {
    type Error = TowerError;

    fn encode(&mut self, data: &[u8], buf: &mut BytesMut) -> Result<(), TowerError> {
        let mut header = [0u8; MAX_HEADER_LENGTH];

        if data.len() > MAX_FRAME_LENGTH {
            return Err(TowerError::DataTooLarge(data.len()));
        }

        let header_len = (data.len() as u64).encode_var(&mut header);
        buf.reserve(header_len + data.len());
        buf.put_slice(&header[..header_len]);
        buf.put_slice(data);
        Ok(())
    }
}

/// Calculate and prepend the header on a single frame.
pub fn build_frame(data: &[u8]) -> Result<Vec<u8>, TowerError> {
    let mut frame = BytesMut::new();
    TowerCodec.encode(data, &mut frame)?;
    Ok(frame.to_vec())
}
