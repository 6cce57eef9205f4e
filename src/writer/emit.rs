use std::io::{Seek, SeekFrom, Write};

use smallvec::SmallVec;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::api::WriteOptions;
use crate::error::{Error, Result, Section};
use crate::frame::{Column, Table};
use crate::parser::MAP_ENTRIES;
use crate::schema::{
    self, LabelSet, Release, SENTINEL_FLOAT32, SENTINEL_FLOAT64, SENTINEL_INT8, SENTINEL_INT16,
    SENTINEL_INT32,
};

use super::prepare::{CellPlan, Prepared, PreparedColumn, prepare};

/// The writer always emits release 118.
const WRITE_RELEASE: Release = Release::V118;

const ZEROS: [u8; 321] = [0; 321];

/// Encodes a table into a seekable sink as a release-118 `.dta` file.
///
/// The offset map is emitted as zeros, then fixed up with one seek-back once
/// every section position is known; a pure-streaming sink is unsupported.
///
/// # Errors
///
/// Returns an error if the sink fails. A partial file may remain on error.
pub(crate) fn write_table<W: Write + Seek>(
    sink: &mut W,
    table: &Table,
    options: &WriteOptions,
) -> Result<()> {
    let prepared = prepare(table, options.verbose());
    let height = table.height();
    let mut map = [0u64; MAP_ENTRIES];

    map[0] = sink.stream_position()?;
    sink.write_all(b"<stata_dta>")?;
    write_header(sink, prepared.columns.len() as u16, height as u64)?;

    map[1] = sink.stream_position()?;
    sink.write_all(b"<map>")?;
    for _ in 0..MAP_ENTRIES {
        sink.write_all(&0u64.to_le_bytes())?;
    }
    sink.write_all(b"</map>")?;

    map[2] = sink.stream_position()?;
    sink.write_all(b"<variable_types>")?;
    for column in &prepared.columns {
        sink.write_all(&column.meta.storage.code().to_le_bytes())?;
    }
    sink.write_all(b"</variable_types>")?;

    map[3] = sink.stream_position()?;
    sink.write_all(b"<varnames>")?;
    for column in &prepared.columns {
        write_padded(sink, &column.meta.name, WRITE_RELEASE.name_width())?;
    }
    sink.write_all(b"</varnames>")?;

    map[4] = sink.stream_position()?;
    sink.write_all(b"<sortlist>")?;
    sink.write_all(&vec![0u8; (prepared.columns.len() + 1) * 2])?;
    sink.write_all(b"</sortlist>")?;

    map[5] = sink.stream_position()?;
    sink.write_all(b"<formats>")?;
    for column in &prepared.columns {
        write_padded(sink, &column.meta.format, WRITE_RELEASE.format_width())?;
    }
    sink.write_all(b"</formats>")?;

    map[6] = sink.stream_position()?;
    sink.write_all(b"<value_label_names>")?;
    for column in &prepared.columns {
        write_padded(sink, &column.meta.label_set, WRITE_RELEASE.label_name_width())?;
    }
    sink.write_all(b"</value_label_names>")?;

    map[7] = sink.stream_position()?;
    sink.write_all(b"<variable_labels>")?;
    for column in &prepared.columns {
        write_padded(sink, &column.meta.label, WRITE_RELEASE.variable_label_width())?;
    }
    sink.write_all(b"</variable_labels>")?;

    map[8] = sink.stream_position()?;
    sink.write_all(b"<characteristics></characteristics>")?;

    map[9] = sink.stream_position()?;
    sink.write_all(b"<data>")?;
    write_body(sink, &prepared, height, options.max_buffer())?;
    sink.write_all(b"</data>")?;

    map[10] = sink.stream_position()?;
    sink.write_all(b"<strls></strls>")?;

    map[11] = sink.stream_position()?;
    write_value_labels(sink, &prepared.label_sets)?;

    map[12] = sink.stream_position()?;
    sink.write_all(b"</stata_dta>")?;
    map[13] = sink.stream_position()?;

    sink.seek(SeekFrom::Start(map[1] + b"<map>".len() as u64))?;
    for offset in map {
        sink.write_all(&offset.to_le_bytes())?;
    }
    sink.seek(SeekFrom::Start(map[13]))?;
    Ok(())
}

fn write_header<W: Write>(sink: &mut W, var_count: u16, row_count: u64) -> Result<()> {
    sink.write_all(b"<header>")?;
    sink.write_all(b"<release>118</release>")?;
    sink.write_all(b"<byteorder>LSF</byteorder>")?;
    sink.write_all(b"<K>")?;
    sink.write_all(&var_count.to_le_bytes())?;
    sink.write_all(b"</K>")?;
    sink.write_all(b"<N>")?;
    sink.write_all(&row_count.to_le_bytes())?;
    sink.write_all(b"</N>")?;
    sink.write_all(b"<label>")?;
    sink.write_all(&0u16.to_le_bytes())?;
    sink.write_all(b"</label>")?;
    let stamp = timestamp();
    sink.write_all(b"<timestamp>")?;
    sink.write_all(&[stamp.len() as u8])?;
    sink.write_all(stamp.as_bytes())?;
    sink.write_all(b"</timestamp>")?;
    sink.write_all(b"</header>")?;
    Ok(())
}

/// Current time rendered `dd uuu yyyy HH:MM`, e.g. `02 Aug 2026 09:15`.
fn timestamp() -> String {
    let format = format_description!("[day] [month repr:short] [year] [hour]:[minute]");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| String::from("01 Jan 1960 00:00"))
}

fn write_body<W: Write>(
    sink: &mut W,
    prepared: &Prepared<'_>,
    height: usize,
    max_buffer: usize,
) -> Result<()> {
    let mut buffer: Vec<u8> = Vec::with_capacity(max_buffer.max(prepared.row_width));
    let mut row_buf: SmallVec<[u8; 128]> = SmallVec::new();
    for row in 0..height {
        row_buf.clear();
        for column in &prepared.columns {
            encode_cell(&mut row_buf, column, row)?;
        }
        buffer.extend_from_slice(&row_buf);
        if buffer.len() >= max_buffer {
            sink.write_all(&buffer)?;
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        sink.write_all(&buffer)?;
    }
    Ok(())
}

fn encode_cell(
    out: &mut SmallVec<[u8; 128]>,
    column: &PreparedColumn<'_>,
    row: usize,
) -> Result<()> {
    match (column.plan, &column.source.data) {
        (CellPlan::Int8, Column::Int8(cells)) => {
            out.push(cells[row].unwrap_or(SENTINEL_INT8) as u8);
        }
        (CellPlan::BoolAsInt8, Column::Bool(cells)) => {
            out.push(cells[row].map_or(SENTINEL_INT8, i8::from) as u8);
        }
        (CellPlan::Int16, Column::Int16(cells)) => {
            out.extend_from_slice(&cells[row].unwrap_or(SENTINEL_INT16).to_le_bytes());
        }
        (CellPlan::Int32, Column::Int32(cells)) => {
            out.extend_from_slice(&cells[row].unwrap_or(SENTINEL_INT32).to_le_bytes());
        }
        (CellPlan::Int64AsInt32, Column::Int64(cells)) => {
            // Range-checked during preparation.
            let value = cells[row].map_or(SENTINEL_INT32, |value| value as i32);
            out.extend_from_slice(&value.to_le_bytes());
        }
        (CellPlan::Float32, Column::Float32(cells)) => {
            out.extend_from_slice(&cells[row].unwrap_or(SENTINEL_FLOAT32).to_le_bytes());
        }
        (CellPlan::Float64, Column::Float64(cells)) => {
            out.extend_from_slice(&cells[row].unwrap_or(SENTINEL_FLOAT64).to_le_bytes());
        }
        (CellPlan::DateAsDays, Column::Date(cells)) => {
            let days = cells[row].map_or(SENTINEL_INT32, schema::days_from_date);
            out.extend_from_slice(&days.to_le_bytes());
        }
        (CellPlan::DateTimeAsMillis, Column::DateTime(cells)) => {
            let millis = cells[row].map_or(SENTINEL_FLOAT64, schema::millis_from_datetime);
            out.extend_from_slice(&millis.to_le_bytes());
        }
        (CellPlan::Str { width }, Column::Str(cells)) => {
            let start = out.len();
            if let Some(text) = &cells[row] {
                out.extend_from_slice(text.as_bytes());
            }
            out.resize(start + width as usize, 0);
        }
        (CellPlan::CategoricalCodes, Column::Categorical(cells)) => {
            let code = cells.codes()[row].map_or(SENTINEL_INT32, |code| code as i32);
            out.extend_from_slice(&code.to_le_bytes());
        }
        _ => {
            return Err(Error::format(
                Section::Table,
                "column plan does not match column data",
            ));
        }
    }
    Ok(())
}

fn write_value_labels<W: Write>(sink: &mut W, sets: &[LabelSet]) -> Result<()> {
    sink.write_all(b"<value_labels>")?;
    for set in sets {
        let mut text = Vec::new();
        let mut offsets: Vec<i32> = Vec::with_capacity(set.len());
        for (_, label) in set.entries() {
            offsets.push(text.len() as i32);
            text.extend_from_slice(label.as_bytes());
            text.push(0);
        }
        let table_len = (8 + 8 * set.len() + text.len()) as u32;
        sink.write_all(b"<lbl>")?;
        sink.write_all(&table_len.to_le_bytes())?;
        write_padded(sink, &set.name, WRITE_RELEASE.label_name_width())?;
        sink.write_all(&[0u8; 3])?;
        sink.write_all(&(set.len() as i32).to_le_bytes())?;
        sink.write_all(&(text.len() as i32).to_le_bytes())?;
        for offset in &offsets {
            sink.write_all(&offset.to_le_bytes())?;
        }
        for (code, _) in set.entries() {
            sink.write_all(&code.to_le_bytes())?;
        }
        sink.write_all(&text)?;
        sink.write_all(b"</lbl>")?;
    }
    sink.write_all(b"</value_labels>")?;
    Ok(())
}

/// Writes `text` truncated to `width - 1` bytes (on a character boundary)
/// followed by null padding to exactly `width` bytes.
fn write_padded<W: Write>(sink: &mut W, text: &str, width: usize) -> Result<()> {
    let content = truncate_bytes(text, width - 1).as_bytes();
    sink.write_all(content)?;
    sink.write_all(&ZEROS[..width - content.len()])?;
    Ok(())
}

fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
