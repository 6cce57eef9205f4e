use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{Error, Result, Section};
use crate::schema::{LabelSet, Release};

use super::byteorder::{read_bytes, read_i32, read_u32, skip};
use super::tags::{expect_tag, peek_bytes};
use super::text::{decode_field, decode_text};

/// Reads the `<value_labels>` section into a dictionary of named label sets.
///
/// # Errors
///
/// Returns an error on marker mismatch or when a `<lbl>` record's declared
/// length disagrees with its contents.
pub fn read_value_labels<R: Read + Seek>(
    reader: &mut R,
    release: Release,
) -> Result<HashMap<String, LabelSet>> {
    expect_tag(reader, "<value_labels>", Section::ValueLabels)?;
    let mut sets = HashMap::new();
    while peek_bytes(reader, 5)? == b"<lbl>" {
        let set = read_label_set(reader, release)?;
        sets.insert(set.name.clone(), set);
    }
    expect_tag(reader, "</value_labels>", Section::ValueLabels)?;
    Ok(sets)
}

fn read_label_set<R: Read + Seek>(reader: &mut R, release: Release) -> Result<LabelSet> {
    expect_tag(reader, "<lbl>", Section::ValueLabels)?;
    let table_len = read_u32(reader)? as usize;
    let name = decode_field(&read_bytes(reader, release.label_name_width())?, release);
    skip(reader, 3)?;

    let entry_count = read_i32(reader)?;
    let text_len = read_i32(reader)?;
    if entry_count < 0 || text_len < 0 {
        return Err(Error::format(
            Section::ValueLabels,
            format!("label set '{name}' declares negative dimensions"),
        ));
    }
    let entry_count = entry_count as usize;
    let text_len = text_len as usize;
    let expected = 8 + 8 * entry_count + text_len;
    if table_len != expected {
        return Err(Error::format(
            Section::ValueLabels,
            format!(
                "label set '{name}' declares {table_len} table bytes but its dimensions imply {expected}"
            ),
        ));
    }

    let mut offsets = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        offsets.push(read_i32(reader)?);
    }
    let mut values = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        values.push(read_i32(reader)?);
    }
    let text = read_bytes(reader, text_len)?;

    let mut set = LabelSet::new(name);
    for (offset, value) in offsets.into_iter().zip(values) {
        let start = usize::try_from(offset).ok().filter(|start| *start <= text_len);
        let Some(start) = start else {
            return Err(Error::format(
                Section::ValueLabels,
                format!(
                    "label set '{}' has text offset {offset} outside its {text_len}-byte text block",
                    set.name
                ),
            ));
        };
        let slice = &text[start..];
        let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
        set.insert(value, decode_text(&slice[..end], release));
    }

    expect_tag(reader, "</lbl>", Section::ValueLabels)?;
    Ok(set)
}
