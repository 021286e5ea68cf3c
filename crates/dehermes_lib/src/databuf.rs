
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::DecompileError;

const TAG_MASK: u8 = 0x70;
const EXTENDED_LENGTH_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferTag {
    Null,
    True,
    False,
    Number,
    LongString,
    ShortString,
    ByteString,
    Integer,
}

impl BufferTag {
    fn from_bits(byte: u8) -> BufferTag {
        match byte & TAG_MASK {
            0x00 => BufferTag::Null,
            0x10 => BufferTag::True,
            0x20 => BufferTag::False,
            0x30 => BufferTag::Number,
            0x40 => BufferTag::LongString,
            0x50 => BufferTag::ShortString,
            0x60 => BufferTag::ByteString,
            _ => BufferTag::Integer,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            BufferTag::Null => 0x00,
            BufferTag::True => 0x10,
            BufferTag::False => 0x20,
            BufferTag::Number => 0x30,
            BufferTag::LongString => 0x40,
            BufferTag::ShortString => 0x50,
            BufferTag::ByteString => 0x60,
            BufferTag::Integer => 0x70,
        }
    }

    fn payload_width(self) -> usize {
        match self {
            BufferTag::Null | BufferTag::True | BufferTag::False => 0,
            BufferTag::ByteString => 1,
            BufferTag::ShortString => 2,
            BufferTag::LongString | BufferTag::Integer => 4,
            BufferTag::Number => 8,
        }
    }

    /// Label used in disassembly; the three string widths collapse to one.
    pub fn label(self) -> &'static str {
        match self {
            BufferTag::Null => "Null",
            BufferTag::True => "True",
            BufferTag::False => "False",
            BufferTag::Number => "Number",
            BufferTag::Integer => "Integer",
            BufferTag::LongString | BufferTag::ShortString | BufferTag::ByteString => "String",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BufferValue {
    Null,
    Bool(bool),
    Number(f64),
    Integer(i32),
    StringIdx(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferRun {
    pub tag: BufferTag,
    pub offset: u32,
    pub values: Vec<BufferValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferEntry {
    pub tag: BufferTag,
    pub value: BufferValue,
    pub offset: u32,
}

// Header byte: bit 7 selects a 12-bit length (low nibble << 8 | next byte),
// bits 4-6 the tag, low nibble the 4-bit length otherwise.
fn read_header(buf: &[u8], pos: usize) -> Result<(BufferTag, usize, usize), DecompileError> {
    let byte = *buf.get(pos).ok_or(DecompileError::MalformedBuffer { offset: pos as u32 })?;
    let tag = BufferTag::from_bits(byte);
    if byte & EXTENDED_LENGTH_FLAG != 0 {
        let ext = *buf
            .get(pos + 1)
            .ok_or(DecompileError::MalformedBuffer { offset: pos as u32 })?;
        Ok((tag, ((byte & 0x0F) as usize) << 8 | ext as usize, pos + 2))
    } else {
        Ok((tag, (byte & 0x0F) as usize, pos + 1))
    }
}

fn read_value(buf: &[u8], pos: usize, tag: BufferTag) -> Result<(BufferValue, usize), DecompileError> {
    let width = tag.payload_width();
    if buf.len() - pos < width {
        return Err(DecompileError::MalformedBuffer { offset: pos as u32 });
    }
    let raw = &buf[pos..pos + width];
    let value = match tag {
        BufferTag::Null => BufferValue::Null,
        BufferTag::True => BufferValue::Bool(true),
        BufferTag::False => BufferValue::Bool(false),
        BufferTag::Number => BufferValue::Number(LittleEndian::read_f64(raw)),
        BufferTag::Integer => BufferValue::Integer(LittleEndian::read_i32(raw)),
        BufferTag::ByteString => BufferValue::StringIdx(raw[0] as u32),
        BufferTag::ShortString => BufferValue::StringIdx(LittleEndian::read_u16(raw) as u32),
        BufferTag::LongString => BufferValue::StringIdx(LittleEndian::read_u32(raw)),
    };
    Ok((value, pos + width))
}

/// Reads the single run whose header starts exactly at `offset`.
pub fn read_run(buf: &[u8], offset: u32) -> Result<BufferRun, DecompileError> {
    let (tag, length, mut pos) = read_header(buf, offset as usize)?;
    let mut values = Vec::with_capacity(length);
    for _ in 0..length {
        let (value, next) = read_value(buf, pos, tag)?;
        values.push(value);
        pos = next;
    }
    Ok(BufferRun { tag, offset, values })
}

/// Scans the whole buffer into its run structure. A run truncated by the
/// buffer bound is dropped and the scan ends; everything decoded so far is
/// kept.
pub fn read_all_runs(buf: &[u8]) -> Vec<BufferRun> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    'scan: while pos < buf.len() {
        let offset = pos as u32;
        let Ok((tag, length, mut cursor)) = read_header(buf, pos) else {
            break;
        };
        let mut values = Vec::with_capacity(length);
        for _ in 0..length {
            match read_value(buf, cursor, tag) {
                Ok((value, next)) => {
                    values.push(value);
                    cursor = next;
                }
                Err(_) => {
                    if !values.is_empty() {
                        runs.push(BufferRun { tag, offset, values });
                    }
                    break 'scan;
                }
            }
        }
        runs.push(BufferRun { tag, offset, values });
        pos = cursor;
    }
    runs
}

/// Flattened view of the buffer. The first entry of each run carries the run
/// header's offset; subsequent entries carry their own payload offsets.
pub fn decode_all(buf: &[u8]) -> Vec<BufferEntry> {
    let mut entries = Vec::new();
    for run in read_all_runs(buf) {
        let mut offset = run.offset;
        let header_width = if buf[run.offset as usize] & EXTENDED_LENGTH_FLAG != 0 { 2 } else { 1 };
        let mut payload = run.offset + header_width;
        for value in run.values {
            entries.push(BufferEntry { tag: run.tag, value, offset });
            payload += run.tag.payload_width() as u32;
            offset = payload;
        }
    }
    entries
}

/// Reads `count` flattened values starting at the run header at `offset`,
/// crossing run boundaries when a literal was split across separately-encoded
/// runs.
pub fn read_series(buf: &[u8], offset: u32, count: usize) -> Result<Vec<BufferValue>, DecompileError> {
    let mut values = Vec::with_capacity(count);
    let mut pos = offset as usize;
    while values.len() < count {
        let (tag, length, mut cursor) = read_header(buf, pos)?;
        for _ in 0..length {
            if values.len() == count {
                break;
            }
            let (value, next) = read_value(buf, cursor, tag)?;
            values.push(value);
            cursor = next;
        }
        pos = cursor;
    }
    Ok(values)
}

/// Inverse of `read_all_runs`. Emits the extended header form exactly when the
/// run length does not fit the 4-bit field, matching the compiler's emitter.
pub fn encode_runs(runs: &[BufferRun]) -> Result<Vec<u8>, DecompileError> {
    let mut out = Vec::new();
    for run in runs {
        let len = run.values.len();
        if len > 0x0FFF {
            return Err(DecompileError::OversizedRun { len });
        }
        if len > 0x0F {
            out.push(EXTENDED_LENGTH_FLAG | run.tag.to_bits() | (len >> 8) as u8);
            out.push((len & 0xFF) as u8);
        } else {
            out.push(run.tag.to_bits() | len as u8);
        }
        for value in &run.values {
            match (run.tag, value) {
                (BufferTag::Null, BufferValue::Null)
                | (BufferTag::True, BufferValue::Bool(true))
                | (BufferTag::False, BufferValue::Bool(false)) => {}
                (BufferTag::Number, BufferValue::Number(v)) => {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                (BufferTag::Integer, BufferValue::Integer(v)) => {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                (BufferTag::ByteString, BufferValue::StringIdx(v)) => out.push(*v as u8),
                (BufferTag::ShortString, BufferValue::StringIdx(v)) => {
                    out.extend_from_slice(&(*v as u16).to_le_bytes());
                }
                (BufferTag::LongString, BufferValue::StringIdx(v)) => {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                _ => return Err(DecompileError::MismatchedRunValue { tag: run.tag }),
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_buffer() -> Vec<u8> {
        // Integer x2 { 7, 9 }, True x3, ShortString x1 { 4 }
        let mut buf = vec![0x70 | 2];
        buf.extend_from_slice(&7i32.to_le_bytes());
        buf.extend_from_slice(&9i32.to_le_bytes());
        buf.push(0x10 | 3);
        buf.push(0x50 | 1);
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf
    }

    #[test]
    fn decodes_runs_with_offsets() {
        let buf = sample_buffer();
        let runs = read_all_runs(&buf);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].tag, BufferTag::Integer);
        assert_eq!(runs[0].offset, 0);
        assert_eq!(runs[1].tag, BufferTag::True);
        assert_eq!(runs[1].offset, 9);
        assert_eq!(runs[1].values, vec![BufferValue::Bool(true); 3]);
        assert_eq!(runs[2].offset, 10);
        assert_eq!(runs[2].values, vec![BufferValue::StringIdx(4)]);
    }

    #[test]
    fn first_entry_carries_header_offset() {
        let buf = sample_buffer();
        let entries = decode_all(&buf);
        assert_eq!(entries[0].offset, 0);
        // second integer sits after the header byte and one 4-byte payload
        assert_eq!(entries[1].offset, 5);
        assert_eq!(entries[2].offset, 9);
    }

    #[test]
    fn extended_length_header() {
        let mut buf = vec![0x80 | 0x10 | 0x01, 0x04]; // True x 0x104
        buf.push(0x00); // Null x0
        let runs = read_all_runs(&buf);
        assert_eq!(runs[0].values.len(), 0x104);
        assert_eq!(runs[1].offset, 2);
        assert!(runs[1].values.is_empty());
    }

    #[test]
    fn read_run_at_exact_offset() {
        let buf = sample_buffer();
        let run = read_run(&buf, 9).unwrap();
        assert_eq!(run.tag, BufferTag::True);
        assert_eq!(run.values.len(), 3);
        // mid-payload offsets decode garbage headers but never panic
        assert!(read_run(&buf, buf.len() as u32).is_err());
    }

    #[test]
    fn series_crosses_run_boundaries() {
        let buf = sample_buffer();
        let series = read_series(&buf, 0, 4).unwrap();
        assert_eq!(
            series,
            vec![
                BufferValue::Integer(7),
                BufferValue::Integer(9),
                BufferValue::Bool(true),
                BufferValue::Bool(true),
            ]
        );
    }

    #[test]
    fn series_matches_decode_all_window() {
        let buf = sample_buffer();
        let entries = decode_all(&buf);
        let start = entries.iter().position(|e| e.offset == 9).unwrap();
        let series = read_series(&buf, 9, 3).unwrap();
        let window: Vec<BufferValue> =
            entries[start..start + 3].iter().map(|e| e.value.clone()).collect();
        assert_eq!(series, window);
    }

    #[test]
    fn series_past_the_end_is_malformed() {
        let buf = sample_buffer();
        assert!(matches!(
            read_series(&buf, 0, 7),
            Err(DecompileError::MalformedBuffer { .. })
        ));
    }

    #[test]
    fn truncated_tail_is_tolerated() {
        let mut buf = sample_buffer();
        buf.push(0x30 | 2); // Number x2 with no payload at all
        buf.push(0x40);
        let runs = read_all_runs(&buf);
        // the damaged trailing run is dropped, everything before it survives
        assert_eq!(runs.len(), 3);
        assert_eq!(decode_all(&buf).len(), 6);
    }

    #[test]
    fn partially_truncated_run_keeps_decoded_values() {
        let mut buf = vec![0x70 | 3];
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&2i32.to_le_bytes());
        buf.push(0xAA); // third value cut short
        let runs = read_all_runs(&buf);
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].values,
            vec![BufferValue::Integer(1), BufferValue::Integer(2)]
        );
    }

    #[test]
    fn encode_round_trips_canonical_buffers() {
        let buf = sample_buffer();
        assert_eq!(encode_runs(&read_all_runs(&buf)).unwrap(), buf);

        let mut long = vec![0x80 | 0x70, 0x10]; // Integer x16, needs the extended form
        for i in 0..16i32 {
            long.extend_from_slice(&i.to_le_bytes());
        }
        assert_eq!(encode_runs(&read_all_runs(&long)).unwrap(), long);
    }

    #[test]
    fn encode_rejects_mismatched_values() {
        let run = BufferRun {
            tag: BufferTag::Number,
            offset: 0,
            values: vec![BufferValue::Bool(true)],
        };
        assert!(matches!(
            encode_runs(&[run]),
            Err(DecompileError::MismatchedRunValue { tag: BufferTag::Number })
        ));
    }
}
