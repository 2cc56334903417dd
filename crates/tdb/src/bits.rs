//! Reading and writing of bit spans inside record buffers.
//!
//! Bits are numbered big endian across the whole buffer: bit 0 is the most
//! significant bit of byte 0. Spans may start and end anywhere, a 2 bit field
//! at offset 708 shares its byte with its neighbours and writes leave every bit
//! outside the span untouched.

use bitvec::prelude::*;

use crate::error::{Error, Result};

/// Widest span that can be loaded as an integer
pub const MAX_INTEGER_BITS: usize = u64::BITS as usize;

fn out_of_range(buffer: &[u8], offset: usize, width: usize) -> Error {
    Error::FieldRange {
        field: String::new(),
        offset: offset as u64,
        bits: width as u64,
        limit: buffer.len() as u64 * 8,
    }
}

fn span(buffer: &[u8], offset: usize, width: usize) -> Result<&BitSlice<u8, Msb0>> {
    buffer
        .view_bits::<Msb0>()
        .get(offset..offset.saturating_add(width))
        .ok_or_else(|| out_of_range(buffer, offset, width))
}

fn span_mut(buffer: &mut [u8], offset: usize, width: usize) -> Result<&mut BitSlice<u8, Msb0>> {
    let limit = buffer.len() * 8;
    if offset.saturating_add(width) > limit {
        return Err(out_of_range(buffer, offset, width));
    }
    Ok(&mut buffer.view_bits_mut::<Msb0>()[offset..offset + width])
}

fn check_width(buffer: &[u8], offset: usize, width: usize) -> Result<()> {
    if width > MAX_INTEGER_BITS {
        return Err(out_of_range(buffer, offset, width));
    }
    Ok(())
}

/// Read `width` bits starting at bit `offset` as an unsigned integer
pub fn read_bits(buffer: &[u8], offset: usize, width: usize) -> Result<u64> {
    check_width(buffer, offset, width)?;
    let bits = span(buffer, offset, width)?;
    if bits.is_empty() {
        return Ok(0);
    }
    Ok(bits.load_be::<u64>())
}

/// Read `width` bits starting at bit `offset` as a two's complement integer
pub fn read_signed_bits(buffer: &[u8], offset: usize, width: usize) -> Result<i64> {
    let value = read_bits(buffer, offset, width)?;
    Ok(sign_extend(value, width))
}

/// Read 32 bits starting at bit `offset` as an IEEE-754 single precision float
pub fn read_float(buffer: &[u8], offset: usize) -> Result<f32> {
    let value = read_bits(buffer, offset, 32)?;
    Ok(f32::from_bits(value as u32))
}

/// Copy `width` bits starting at bit `offset` into a new buffer, left aligned
///
/// The last byte is zero padded when `width` is not a multiple of 8.
pub fn read_raw_bits(buffer: &[u8], offset: usize, width: usize) -> Result<Vec<u8>> {
    let bits = span(buffer, offset, width)?;
    let mut copy = BitVec::<u8, Msb0>::repeat(false, width);
    copy.copy_from_bitslice(bits);
    Ok(copy.into_vec())
}

/// Borrow `length` bytes starting at byte `offset`
pub fn read_bytes(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    buffer
        .get(offset..offset.saturating_add(length))
        .ok_or_else(|| out_of_range(buffer, offset * 8, length * 8))
}

/// Read a NUL padded string of `length` bytes starting at byte `offset`
///
/// Trailing NUL bytes are removed.
pub fn read_string(buffer: &[u8], offset: usize, length: usize) -> Result<String> {
    let bytes = read_bytes(buffer, offset, length)?;
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Write the low `width` bits of `value` starting at bit `offset`
pub fn write_bits(buffer: &mut [u8], offset: usize, width: usize, value: u64) -> Result<()> {
    check_width(buffer, offset, width)?;
    let bits = span_mut(buffer, offset, width)?;
    if !bits.is_empty() {
        bits.store_be(value);
    }
    Ok(())
}

/// Write `value` as a `width` bit two's complement integer starting at bit `offset`
pub fn write_signed_bits(buffer: &mut [u8], offset: usize, width: usize, value: i64) -> Result<()> {
    write_bits(buffer, offset, width, value as u64)
}

/// Write `value` as 32 bits starting at bit `offset`
pub fn write_float(buffer: &mut [u8], offset: usize, value: f32) -> Result<()> {
    write_bits(buffer, offset, 32, value.to_bits() as u64)
}

/// Write the first `width` bits of `value` starting at bit `offset`
///
/// Missing bits in `value` are written as zero.
pub fn write_raw_bits(buffer: &mut [u8], offset: usize, width: usize, value: &[u8]) -> Result<()> {
    let bits = span_mut(buffer, offset, width)?;
    let source = value.view_bits::<Msb0>();
    let copied = source.len().min(width);
    bits[..copied].copy_from_bitslice(&source[..copied]);
    bits[copied..].fill(false);
    Ok(())
}

/// Write `value` into the `length` bytes starting at byte `offset`
///
/// Shorter values are NUL padded, longer values are truncated.
pub fn write_bytes(buffer: &mut [u8], offset: usize, length: usize, value: &[u8]) -> Result<()> {
    if offset.saturating_add(length) > buffer.len() {
        return Err(out_of_range(buffer, offset * 8, length * 8));
    }
    let target = &mut buffer[offset..offset + length];
    let copied = value.len().min(length);
    target[..copied].copy_from_slice(&value[..copied]);
    target[copied..].fill(0);
    Ok(())
}

/// Extend the sign bit of a `width` bit value
pub fn sign_extend(value: u64, width: usize) -> i64 {
    if width == 0 || width >= MAX_INTEGER_BITS {
        return value as i64;
    }
    let shift = MAX_INTEGER_BITS - width;
    ((value << shift) as i64) >> shift
}

/// Whether `value` can be stored in an unsigned field of `width` bits
pub fn fits_unsigned(value: u64, width: usize) -> bool {
    width >= MAX_INTEGER_BITS || value >> width == 0
}

/// Whether `value` can be stored in a two's complement field of `width` bits
pub fn fits_signed(value: i64, width: usize) -> bool {
    if width == 0 {
        return value == 0;
    }
    if width >= MAX_INTEGER_BITS {
        return true;
    }
    let min = -(1i64 << (width - 1));
    let max = (1i64 << (width - 1)) - 1;
    (min..=max).contains(&value)
}
