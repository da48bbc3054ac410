// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounds-checked cursor over a VPD byte buffer.
//!
//! Every multi-byte read in the parsers goes through [`Cursor::take`], so
//! truncated input surfaces as `MalformedData` from exactly one place.

use crate::VpdError;

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start a cursor at `pos`; fails if `pos` is already out of bounds.
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self, VpdError> {
        if pos > buf.len() {
            return Err(VpdError::MalformedData("truncated VPD data"));
        }
        Ok(Self { buf, pos })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `n` bytes, advancing the cursor.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], VpdError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(VpdError::MalformedData("truncated VPD data"))?;
        if end > self.buf.len() {
            return Err(VpdError::MalformedData("truncated VPD data"));
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), VpdError> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, VpdError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 2-byte little-endian unsigned value.
    pub fn u16_le(&mut self) -> Result<u16, VpdError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Look at the next byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }
}
