mod body;
mod byteorder;
mod header;
mod labels;
mod meta;
mod strl;
mod tags;
mod text;

pub use header::{FileHeader, MAP_ENTRIES, SectionMap, read_header};
pub use labels::read_value_labels;
pub use meta::read_metadata;
pub use strl::{StrlHeap, read_strls};

use std::io::{Read, Seek};

use crate::error::{Error, Result, Section};
use crate::frame::Table;
use crate::schema::VarMeta;

use body::{ColumnBuilder, RowLayout, decode_rows, finish_columns};
use tags::{expect_tag, peek_bytes};

/// Bodies below this byte count are slurped whole; larger bodies are read in
/// row slabs whose decode results are concatenated column-wise.
pub(crate) const WHOLE_BODY_LIMIT: u64 = 100_000_000;

/// Lower bound on slab size when chunking.
pub(crate) const MIN_CHUNK_ROWS: u64 = 100_000;

/// Decodes the remainder of a file whose header and metadata have been read:
/// data body, strL heap, value labels, trailer, and the per-column
/// post-processing pass.
///
/// `chunks` is a memory strategy only; every value produces the same table.
pub(crate) fn decode_stream<R: Read + Seek>(
    reader: &mut R,
    header: &FileHeader,
    vars: &[VarMeta],
    chunks: u64,
    keep_original: bool,
    body_limit: u64,
) -> Result<Table> {
    let layout = RowLayout::new(vars);
    let total = header.row_count;
    // Capacity hint only; clamped so a corrupt row count cannot force an
    // absurd up-front allocation.
    let capacity = usize::try_from(total.min(1 << 24)).unwrap_or(usize::MAX);
    let mut builders: Vec<ColumnBuilder> = vars
        .iter()
        .map(|var| ColumnBuilder::new(var, capacity))
        .collect();

    expect_tag(reader, "<data>", Section::Data { row: 0 })?;
    if layout.row_width > 0 && total > 0 {
        let row_width = layout.row_width as u64;
        let body_bytes = row_width.saturating_mul(total);
        let chunk_rows = if body_bytes < body_limit {
            total
        } else {
            total.div_ceil(chunks.max(1)).max(MIN_CHUNK_ROWS)
        };
        let mut slab = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let take = remaining.min(chunk_rows);
            let slab_bytes = usize::try_from(take * row_width).map_err(|_| {
                Error::format(
                    Section::Data {
                        row: total - remaining,
                    },
                    "data slab exceeds the platform address space",
                )
            })?;
            slab.resize(slab_bytes, 0);
            reader.read_exact(&mut slab)?;
            decode_rows(&slab, &layout, &mut builders, header.release);
            remaining -= take;
        }
    }
    expect_tag(reader, "</data>", Section::Data { row: total })?;

    let heap = if peek_bytes(reader, 6)? == b"<strls" {
        read_strls(reader, header.release)?
    } else {
        StrlHeap::empty()
    };
    let labels = read_value_labels(reader, header.release)?;
    expect_tag(reader, "</stata_dta>", Section::Trailer)?;

    let columns = finish_columns(builders, vars, &heap, &labels, keep_original)?;
    let mut table = Table::new();
    for column in columns {
        table.push_named(column)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WriteOptions;
    use crate::frame::Column;
    use crate::writer::write_table;
    use std::io::Cursor;

    fn decode_with(bytes: &[u8], chunks: u64, body_limit: u64) -> Table {
        let mut cursor = Cursor::new(bytes.to_vec());
        let header = read_header(&mut cursor).unwrap();
        let vars = read_metadata(&mut cursor, &header).unwrap();
        decode_stream(&mut cursor, &header, &vars, chunks, false, body_limit).unwrap()
    }

    #[test]
    fn chunked_decode_matches_whole_body_decode() {
        // Enough rows to span multiple slabs once the body limit is forced
        // down: 150_000 one-byte rows against the 100_000-row slab floor.
        let rows = 150_000usize;
        let cells: Vec<Option<i8>> = (0..rows).map(|i| Some((i % 100) as i8)).collect();
        let mut table = Table::new();
        table.push("x", Column::Int8(cells)).unwrap();

        let mut buffer = Cursor::new(Vec::new());
        write_table(&mut buffer, &table, &WriteOptions::new().with_verbose(false)).unwrap();
        let bytes = buffer.into_inner();

        let whole = decode_with(&bytes, 1, u64::MAX);
        for chunks in [1, 3, 10] {
            let chunked = decode_with(&bytes, chunks, 1);
            assert_eq!(chunked, whole);
        }
        assert_eq!(whole.height(), rows);
    }

    #[test]
    fn missing_strls_section_reads_as_empty_heap() {
        let mut table = Table::new();
        table
            .push("v", Column::Float64(vec![Some(1.5), None]))
            .unwrap();
        let mut buffer = Cursor::new(Vec::new());
        write_table(&mut buffer, &table, &WriteOptions::new().with_verbose(false)).unwrap();
        let mut bytes = buffer.into_inner();

        // Splice the empty <strls></strls> section out of the writer output.
        let start = find(&bytes, b"<strls>");
        let end = find(&bytes, b"</strls>") + b"</strls>".len();
        bytes.drain(start..end);

        let decoded = decode_with(&bytes, 10, u64::MAX);
        assert_eq!(
            decoded.column("v").unwrap().data,
            Column::Float64(vec![Some(1.5), None])
        );
    }

    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
            .expect("marker present")
    }
}
