use std::io::Read;

use crate::error::{Error, Result, Section};
use crate::schema::Release;

use super::byteorder::{read_bytes, read_u8, read_u16, read_u32, read_u64};
use super::tags::expect_tag;
use super::text::decode_text;

/// Number of entries in the `<map>` section offset table.
pub const MAP_ENTRIES: usize = 14;

/// Decoded file header: release envelope, dimensions, and the offset map.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub release: Release,
    pub var_count: u16,
    pub row_count: u64,
    /// Dataset label; not preserved on round-trip.
    pub dataset_label: String,
    /// Creation timestamp as recorded in the file; not preserved on round-trip.
    pub timestamp: String,
    pub map: SectionMap,
}

/// The fixed 14-entry table of section offsets following the header.
///
/// A sequential reader does not depend on these values; they are surfaced for
/// inspection and random access.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionMap {
    pub offsets: [u64; MAP_ENTRIES],
}

impl SectionMap {
    #[must_use]
    pub const fn data(&self) -> u64 {
        self.offsets[9]
    }

    #[must_use]
    pub const fn strls(&self) -> u64 {
        self.offsets[10]
    }

    #[must_use]
    pub const fn value_labels(&self) -> u64 {
        self.offsets[11]
    }

    #[must_use]
    pub const fn end_of_file(&self) -> u64 {
        self.offsets[13]
    }
}

/// Reads the header envelope, dimensions, dataset label, timestamp, and the
/// section offset map.
///
/// # Errors
///
/// Fails with `Format` when the `stata_dta` signature or any header marker is
/// absent, `UnsupportedVersion` for releases other than 117/118, and
/// `UnsupportedEndian` for byte orders other than `LSF`.
pub fn read_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    expect_tag(reader, "<stata_dta>", Section::Header)?;
    expect_tag(reader, "<header>", Section::Header)?;

    expect_tag(reader, "<release>", Section::Header)?;
    let digits = read_bytes(reader, 3)?;
    let code = std::str::from_utf8(&digits)
        .ok()
        .and_then(|text| text.parse::<u16>().ok())
        .ok_or_else(|| Error::format(Section::Header, "release is not a 3-digit decimal"))?;
    let release = Release::from_code(code)?;
    expect_tag(reader, "</release>", Section::Header)?;

    expect_tag(reader, "<byteorder>", Section::Header)?;
    let marker = read_bytes(reader, 3)?;
    if marker != b"LSF" {
        return Err(Error::UnsupportedEndian {
            marker: String::from_utf8_lossy(&marker).into_owned(),
        });
    }
    expect_tag(reader, "</byteorder>", Section::Header)?;

    expect_tag(reader, "<K>", Section::Header)?;
    let var_count = read_u16(reader)?;
    expect_tag(reader, "</K>", Section::Header)?;

    expect_tag(reader, "<N>", Section::Header)?;
    let row_count = match release {
        Release::V117 => u64::from(read_u32(reader)?),
        Release::V118 => read_u64(reader)?,
    };
    expect_tag(reader, "</N>", Section::Header)?;

    expect_tag(reader, "<label>", Section::Header)?;
    let label_len = match release {
        Release::V117 => usize::from(read_u8(reader)?),
        Release::V118 => usize::from(read_u16(reader)?),
    };
    let dataset_label = decode_text(&read_bytes(reader, label_len)?, release);
    expect_tag(reader, "</label>", Section::Header)?;

    expect_tag(reader, "<timestamp>", Section::Header)?;
    let timestamp_len = usize::from(read_u8(reader)?);
    let timestamp = String::from_utf8_lossy(&read_bytes(reader, timestamp_len)?)
        .trim()
        .to_owned();
    expect_tag(reader, "</timestamp>", Section::Header)?;

    expect_tag(reader, "</header>", Section::Header)?;

    expect_tag(reader, "<map>", Section::Map)?;
    let mut offsets = [0u64; MAP_ENTRIES];
    for slot in &mut offsets {
        *slot = read_u64(reader)?;
    }
    expect_tag(reader, "</map>", Section::Map)?;

    Ok(FileHeader {
        release,
        var_count,
        row_count,
        dataset_label,
        timestamp,
        map: SectionMap { offsets },
    })
}
