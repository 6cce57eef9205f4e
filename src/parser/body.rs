use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use time::Date;

use crate::error::{Error, Result, Section};
use crate::frame::{Categorical, Column, NamedColumn};
use crate::schema::{
    self, FormatClass, LabelSet, MISSING_ABOVE_FLOAT32, MISSING_ABOVE_FLOAT64, MISSING_ABOVE_INT8,
    MISSING_ABOVE_INT16, MISSING_ABOVE_INT32, Release, StorageType, VarMeta,
};

use super::strl::StrlHeap;
use super::text::decode_text;

/// Byte layout of one data row: per-column `(offset, width)` pairs.
pub(crate) struct RowLayout {
    pub offsets: Vec<(usize, usize)>,
    pub row_width: usize,
}

impl RowLayout {
    pub(crate) fn new(vars: &[VarMeta]) -> Self {
        let mut offsets = Vec::with_capacity(vars.len());
        let mut cursor = 0usize;
        for var in vars {
            let width = var.storage.cell_width();
            offsets.push((cursor, width));
            cursor += width;
        }
        Self {
            offsets,
            row_width: cursor,
        }
    }
}

/// Per-column accumulator filled while scanning the row-major body.
///
/// Raw cells are kept in the storage domain; date and datetime
/// reinterpretation happens in [`ColumnBuilder::finish`], after the missing
/// sentinel test has already been applied to the raw value.
pub(crate) enum ColumnBuilder {
    Int8(Vec<Option<i8>>),
    Int16 {
        cells: Vec<Option<i16>>,
        class: FormatClass,
    },
    Int32 {
        cells: Vec<Option<i32>>,
        class: FormatClass,
    },
    Float32 {
        cells: Vec<Option<f32>>,
        class: FormatClass,
    },
    Float64 {
        cells: Vec<Option<f64>>,
        class: FormatClass,
    },
    Str(Vec<Option<String>>),
    StrL(Vec<Option<(u32, u64)>>),
}

impl ColumnBuilder {
    pub(crate) fn new(meta: &VarMeta, rows: usize) -> Self {
        let class = meta.format_class();
        match meta.storage {
            StorageType::Byte => Self::Int8(Vec::with_capacity(rows)),
            StorageType::Int => Self::Int16 {
                cells: Vec::with_capacity(rows),
                class,
            },
            StorageType::Long => Self::Int32 {
                cells: Vec::with_capacity(rows),
                class,
            },
            StorageType::Float => Self::Float32 {
                cells: Vec::with_capacity(rows),
                class,
            },
            StorageType::Double => Self::Float64 {
                cells: Vec::with_capacity(rows),
                class,
            },
            StorageType::Str(_) => Self::Str(Vec::with_capacity(rows)),
            StorageType::StrL => Self::StrL(Vec::with_capacity(rows)),
        }
    }

    /// Appends one raw cell. `bytes` has exactly the storage type's width.
    pub(crate) fn push_cell(&mut self, bytes: &[u8], release: Release) {
        match self {
            Self::Int8(cells) => {
                let value = bytes[0] as i8;
                cells.push((value <= MISSING_ABOVE_INT8).then_some(value));
            }
            Self::Int16 { cells, .. } => {
                let value = i16::from_le_bytes([bytes[0], bytes[1]]);
                cells.push((value <= MISSING_ABOVE_INT16).then_some(value));
            }
            Self::Int32 { cells, .. } => {
                let value = i32::from_le_bytes(bytes[..4].try_into().expect("4-byte cell"));
                cells.push((value <= MISSING_ABOVE_INT32).then_some(value));
            }
            Self::Float32 { cells, .. } => {
                let value = f32::from_le_bytes(bytes[..4].try_into().expect("4-byte cell"));
                // NaN is not a missing sentinel and passes through.
                cells.push(if value > MISSING_ABOVE_FLOAT32 {
                    None
                } else {
                    Some(value)
                });
            }
            Self::Float64 { cells, .. } => {
                let value = f64::from_le_bytes(bytes[..8].try_into().expect("8-byte cell"));
                cells.push(if value > MISSING_ABOVE_FLOAT64 {
                    None
                } else {
                    Some(value)
                });
            }
            Self::Str(cells) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                cells.push(if end == 0 {
                    None
                } else {
                    Some(decode_text(&bytes[..end], release))
                });
            }
            Self::StrL(cells) => {
                let (v, o) = match release {
                    Release::V117 => (
                        u32::from_le_bytes(bytes[..4].try_into().expect("8-byte cell")),
                        u64::from(u32::from_le_bytes(bytes[4..8].try_into().expect("8-byte cell"))),
                    ),
                    Release::V118 => {
                        let raw = u64::from_le_bytes(bytes[..8].try_into().expect("8-byte cell"));
                        ((raw & 0xFFFF) as u32, raw >> 16)
                    }
                };
                cells.push((v != 0 || o != 0).then_some((v, o)));
            }
        }
    }

    /// Materializes the accumulated cells into a logical column, applying
    /// date/datetime reinterpretation, value-label categoricals, and strL
    /// resolution.
    fn finish(
        self,
        meta: &VarMeta,
        heap: &StrlHeap,
        labels: &HashMap<String, LabelSet>,
        keep_original: bool,
    ) -> Result<Column> {
        match self {
            Self::Int8(cells) => match lookup_labels(meta, labels)? {
                Some(set) => labeled_categorical(
                    cells.into_iter().map(|cell| cell.map(i32::from)).collect(),
                    set,
                    keep_original,
                ),
                None => Ok(Column::Int8(cells)),
            },
            Self::Int16 { cells, class } => {
                if class == FormatClass::Date {
                    Ok(Column::Date(
                        cells
                            .into_iter()
                            .map(|cell| cell.and_then(|days| schema::date_from_days(i32::from(days))))
                            .collect(),
                    ))
                } else {
                    match lookup_labels(meta, labels)? {
                        Some(set) => labeled_categorical(
                            cells.into_iter().map(|cell| cell.map(i32::from)).collect(),
                            set,
                            keep_original,
                        ),
                        None => Ok(Column::Int16(cells)),
                    }
                }
            }
            Self::Int32 { cells, class } => match class {
                FormatClass::Date => Ok(Column::Date(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(schema::date_from_days))
                        .collect(),
                )),
                FormatClass::DateTime => Ok(Column::DateTime(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(|ms| schema::datetime_from_millis(f64::from(ms))))
                        .collect(),
                )),
                FormatClass::Plain => match lookup_labels(meta, labels)? {
                    Some(set) => labeled_categorical(cells, set, keep_original),
                    None => Ok(Column::Int32(cells)),
                },
            },
            Self::Float32 { cells, class } => match class {
                FormatClass::Date => Ok(Column::Date(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(|days| date_from_float_days(f64::from(days))))
                        .collect(),
                )),
                FormatClass::DateTime => Ok(Column::DateTime(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(|ms| schema::datetime_from_millis(f64::from(ms))))
                        .collect(),
                )),
                FormatClass::Plain => Ok(Column::Float32(cells)),
            },
            Self::Float64 { cells, class } => match class {
                FormatClass::Date => Ok(Column::Date(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(date_from_float_days))
                        .collect(),
                )),
                FormatClass::DateTime => Ok(Column::DateTime(
                    cells
                        .into_iter()
                        .map(|cell| cell.and_then(schema::datetime_from_millis))
                        .collect(),
                )),
                FormatClass::Plain => Ok(Column::Float64(cells)),
            },
            Self::Str(cells) => Ok(Column::Str(cells)),
            Self::StrL(refs) => {
                let mut values = Vec::with_capacity(refs.len());
                for cell in refs {
                    match cell {
                        None => values.push(None),
                        Some((v, o)) => match heap.get(v, o) {
                            Some(text) => values.push(Some(text.to_owned())),
                            None => {
                                return Err(Error::format(
                                    Section::Strls,
                                    format!(
                                        "data body references strL ({v}, {o}) absent from the heap"
                                    ),
                                ));
                            }
                        },
                    }
                }
                Ok(Column::Categorical(Categorical::from_values(values)))
            }
        }
    }
}

/// Decodes a slab of whole rows into the column accumulators.
pub(crate) fn decode_rows(
    buffer: &[u8],
    layout: &RowLayout,
    builders: &mut [ColumnBuilder],
    release: Release,
) {
    for row in buffer.chunks_exact(layout.row_width) {
        for ((offset, width), builder) in layout.offsets.iter().zip(builders.iter_mut()) {
            builder.push_cell(&row[*offset..offset + width], release);
        }
    }
}

/// Runs the per-column post-processing pass. Columns are finished in
/// parallel; observable column order is preserved by the indexed collect.
pub(crate) fn finish_columns(
    builders: Vec<ColumnBuilder>,
    vars: &[VarMeta],
    heap: &StrlHeap,
    labels: &HashMap<String, LabelSet>,
    keep_original: bool,
) -> Result<Vec<NamedColumn>> {
    builders
        .into_par_iter()
        .zip(vars.par_iter())
        .map(|(builder, meta)| {
            let data = builder.finish(meta, heap, labels, keep_original)?;
            Ok(NamedColumn {
                name: meta.name.clone(),
                label: (!meta.label.is_empty()).then(|| meta.label.clone()),
                data,
            })
        })
        .collect()
}

fn lookup_labels<'a>(
    meta: &VarMeta,
    labels: &'a HashMap<String, LabelSet>,
) -> Result<Option<&'a LabelSet>> {
    if meta.label_set.is_empty() {
        return Ok(None);
    }
    labels.get(&meta.label_set).map(Some).ok_or_else(|| {
        Error::format(
            Section::ValueLabels,
            format!(
                "column '{}' references undefined value-label set '{}'",
                meta.name, meta.label_set
            ),
        )
    })
}

/// Builds a categorical from labeled integer codes. Category order is the
/// ascending code order of the label set; codes absent from the set become
/// trailing categories rendered from the code itself.
fn labeled_categorical(
    cells: Vec<Option<i32>>,
    set: &LabelSet,
    keep_original: bool,
) -> Result<Column> {
    let mut level_index: HashMap<i32, u32> = HashMap::with_capacity(set.len());
    let mut levels: Vec<String> = Vec::with_capacity(set.len());
    for (code, text) in set.entries() {
        level_index.insert(*code, levels.len() as u32);
        levels.push(if keep_original {
            format!("{code}: {text}")
        } else {
            text.clone()
        });
    }
    let unlabeled: BTreeSet<i32> = cells
        .iter()
        .flatten()
        .filter(|code| !level_index.contains_key(code))
        .copied()
        .collect();
    for code in unlabeled {
        level_index.insert(code, levels.len() as u32);
        levels.push(if keep_original {
            format!("{code}: {code}")
        } else {
            format!("{code}")
        });
    }
    let codes = cells
        .into_iter()
        .map(|cell| {
            cell.map(|code| {
                level_index
                    .get(&code)
                    .copied()
                    .expect("all present codes indexed above")
            })
        })
        .collect();
    Categorical::from_parts(levels, codes).map(Column::Categorical)
}

fn date_from_float_days(days: f64) -> Option<Date> {
    if !days.is_finite() {
        return None;
    }
    let rounded = days.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return None;
    }
    schema::date_from_days(rounded as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SENTINEL_INT8;
    use time::macros::date;

    fn meta(storage: StorageType, format: &str, label_set: &str) -> VarMeta {
        VarMeta {
            name: "x".to_owned(),
            storage,
            format: format.to_owned(),
            label_set: label_set.to_owned(),
            label: String::new(),
        }
    }

    #[test]
    fn int8_sentinel_threshold() {
        let var = meta(StorageType::Byte, "%8.0g", "");
        let mut builder = ColumnBuilder::new(&var, 4);
        for raw in [1i8, 100, SENTINEL_INT8, 127] {
            builder.push_cell(&[raw as u8], Release::V118);
        }
        let column = builder
            .finish(&var, &StrlHeap::empty(), &HashMap::new(), false)
            .unwrap();
        assert_eq!(column, Column::Int8(vec![Some(1), Some(100), None, None]));
    }

    #[test]
    fn nan_is_not_missing() {
        let var = meta(StorageType::Double, "%11.1f", "");
        let mut builder = ColumnBuilder::new(&var, 1);
        builder.push_cell(&f64::NAN.to_le_bytes(), Release::V118);
        let Column::Float64(cells) = builder
            .finish(&var, &StrlHeap::empty(), &HashMap::new(), false)
            .unwrap()
        else {
            panic!("expected f64 column");
        };
        assert!(cells[0].is_some_and(f64::is_nan));
    }

    #[test]
    fn date_column_from_day_offsets() {
        let var = meta(StorageType::Long, "%tdNN-DD-CCYY", "");
        let mut builder = ColumnBuilder::new(&var, 3);
        for days in [0i32, 22081, 2_147_483_621] {
            builder.push_cell(&days.to_le_bytes(), Release::V118);
        }
        let column = builder
            .finish(&var, &StrlHeap::empty(), &HashMap::new(), false)
            .unwrap();
        assert_eq!(
            column,
            Column::Date(vec![
                Some(date!(1960 - 01 - 01)),
                Some(date!(2020 - 06 - 15)),
                // The sentinel test runs in the raw domain before the date rule.
                None,
            ])
        );
    }

    #[test]
    fn strl_cell_split_release_118() {
        let var = meta(StorageType::StrL, "%-8s", "");
        let mut builder = ColumnBuilder::new(&var, 2);
        let raw: u64 = (16 << 16) | 3;
        builder.push_cell(&raw.to_le_bytes(), Release::V118);
        builder.push_cell(&0u64.to_le_bytes(), Release::V118);
        let ColumnBuilder::StrL(cells) = &builder else {
            panic!("expected strL builder");
        };
        assert_eq!(cells.as_slice(), &[Some((3, 16)), None]);
    }

    #[test]
    fn labeled_column_orders_levels_by_code() {
        let mut set = LabelSet::new("grade".to_owned());
        set.insert(2, "high".to_owned());
        set.insert(0, "low".to_owned());
        set.insert(1, "mid".to_owned());
        let column =
            labeled_categorical(vec![Some(1), Some(0), None, Some(7)], &set, false).unwrap();
        let Column::Categorical(cells) = column else {
            panic!("expected categorical");
        };
        assert_eq!(cells.levels(), ["low", "mid", "high", "7"]);
        assert_eq!(cells.value_at(0), Some("mid"));
        assert_eq!(cells.value_at(2), None);
        assert_eq!(cells.value_at(3), Some("7"));
    }

    #[test]
    fn keep_original_prefixes_codes() {
        let mut set = LabelSet::new("grade".to_owned());
        set.insert(0, "low".to_owned());
        let column = labeled_categorical(vec![Some(0), Some(3)], &set, true).unwrap();
        let Column::Categorical(cells) = column else {
            panic!("expected categorical");
        };
        assert_eq!(cells.levels(), ["0: low", "3: 3"]);
    }

    #[test]
    fn undefined_label_set_is_an_error() {
        let var = meta(StorageType::Byte, "%8.0g", "ghost");
        let mut builder = ColumnBuilder::new(&var, 1);
        builder.push_cell(&[1], Release::V118);
        let err = builder
            .finish(&var, &StrlHeap::empty(), &HashMap::new(), false)
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
