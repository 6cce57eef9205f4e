use std::io::{Read, Seek};

use crate::error::{Result, Section};
use crate::schema::{StorageType, VarMeta};

use super::byteorder::{read_bytes, read_u16, read_u32, skip};
use super::header::FileHeader;
use super::tags::{expect_tag, peek_bytes};
use super::text::decode_field;

/// Reads the metadata sections between the offset map and `<data>`: variable
/// types, names, sort list, display formats, value-label names, and variable
/// labels. The characteristics section is skipped.
///
/// # Errors
///
/// Returns an error if any section marker is missing, a storage-type code is
/// unrecognized, or the stream ends early.
pub fn read_metadata<R: Read + Seek>(reader: &mut R, header: &FileHeader) -> Result<Vec<VarMeta>> {
    let release = header.release;
    let count = usize::from(header.var_count);

    expect_tag(reader, "<variable_types>", Section::VariableTypes)?;
    let mut storages = Vec::with_capacity(count);
    for _ in 0..count {
        storages.push(StorageType::from_code(read_u16(reader)?)?);
    }
    expect_tag(reader, "</variable_types>", Section::VariableTypes)?;

    let names = read_string_block(
        reader,
        count,
        release.name_width(),
        header,
        ("<varnames>", "</varnames>", Section::VariableNames),
    )?;

    expect_tag(reader, "<sortlist>", Section::SortList)?;
    skip(reader, ((count + 1) * 2) as u64)?;
    expect_tag(reader, "</sortlist>", Section::SortList)?;

    let formats = read_string_block(
        reader,
        count,
        release.format_width(),
        header,
        ("<formats>", "</formats>", Section::Formats),
    )?;
    let label_sets = read_string_block(
        reader,
        count,
        release.label_name_width(),
        header,
        (
            "<value_label_names>",
            "</value_label_names>",
            Section::ValueLabelNames,
        ),
    )?;
    let labels = read_string_block(
        reader,
        count,
        release.variable_label_width(),
        header,
        (
            "<variable_labels>",
            "</variable_labels>",
            Section::VariableLabels,
        ),
    )?;

    skip_characteristics(reader)?;

    let mut variables = Vec::with_capacity(count);
    for (((name, storage), format), (label_set, label)) in names
        .into_iter()
        .zip(storages)
        .zip(formats)
        .zip(label_sets.into_iter().zip(labels))
    {
        variables.push(VarMeta {
            name,
            storage,
            format,
            label_set,
            label,
        });
    }
    Ok(variables)
}

fn read_string_block<R: Read>(
    reader: &mut R,
    count: usize,
    width: usize,
    header: &FileHeader,
    (open, close, section): (&'static str, &'static str, Section),
) -> Result<Vec<String>> {
    expect_tag(reader, open, section.clone())?;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let field = read_bytes(reader, width)?;
        values.push(decode_field(&field, header.release));
    }
    expect_tag(reader, close, section)?;
    Ok(values)
}

/// Skips the characteristics section: a run of `<ch>` blocks, each carrying
/// its own byte length, terminated by `</characteristics>`.
fn skip_characteristics<R: Read + Seek>(reader: &mut R) -> Result<()> {
    expect_tag(reader, "<characteristics>", Section::Characteristics)?;
    loop {
        if peek_bytes(reader, 4)? == b"<ch>" {
            expect_tag(reader, "<ch>", Section::Characteristics)?;
            let len = read_u32(reader)?;
            skip(reader, u64::from(len))?;
            expect_tag(reader, "</ch>", Section::Characteristics)?;
        } else {
            expect_tag(reader, "</characteristics>", Section::Characteristics)?;
            return Ok(());
        }
    }
}
