use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{Error, Result, Section};
use crate::schema::Release;

use super::byteorder::{read_bytes, read_u8, read_u32, read_u64};
use super::tags::{expect_tag, peek_bytes};
use super::text::decode_text;

const GSO_FLAG_BINARY: u8 = 129;
const GSO_FLAG_ASCII: u8 = 130;

/// The long-string heap: payloads addressed by `(v, o)` pairs from the data
/// body. `(0, 0)` denotes missing and is never stored.
#[derive(Debug, Default)]
pub struct StrlHeap {
    entries: HashMap<(u32, u64), String>,
}

impl StrlHeap {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, v: u32, o: u64) -> Option<&str> {
        self.entries.get(&(v, o)).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads the strL heap, including its `<strls>`/`</strls>` markers.
///
/// Each record is the literal `GSO`, `v`, `o` (whose width depends on the
/// release), a flag byte, a payload length, and the payload itself. Flag 130
/// marks null-terminated text; flag 129 marks binary-safe payloads.
///
/// # Errors
///
/// Returns an error on marker mismatch or an unknown flag byte.
pub fn read_strls<R: Read + Seek>(reader: &mut R, release: Release) -> Result<StrlHeap> {
    expect_tag(reader, "<strls>", Section::Strls)?;
    let mut heap = StrlHeap::empty();
    while peek_bytes(reader, 3)? == b"GSO" {
        expect_tag(reader, "GSO", Section::Strls)?;
        let v = read_u32(reader)?;
        let o = match release {
            Release::V117 => u64::from(read_u32(reader)?),
            Release::V118 => read_u64(reader)?,
        };
        let flag = read_u8(reader)?;
        let len = read_u32(reader)? as usize;
        let payload = read_bytes(reader, len)?;
        let text = match flag {
            GSO_FLAG_ASCII => {
                let content = payload.strip_suffix(&[0]).unwrap_or(&payload);
                decode_text(content, release)
            }
            GSO_FLAG_BINARY => decode_text(&payload, release),
            other => {
                return Err(Error::format(
                    Section::Strls,
                    format!("unknown GSO flag byte {other}"),
                ));
            }
        };
        heap.entries.insert((v, o), text);
    }
    expect_tag(reader, "</strls>", Section::Strls)?;
    Ok(heap)
}
