use std::collections::HashSet;

use crate::frame::{Column, NamedColumn, Table};
use crate::logger;
use crate::schema::{LabelSet, StorageType, VarMeta};

/// How the emitter turns a column's cells into raw body bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellPlan {
    Int8,
    BoolAsInt8,
    Int16,
    Int32,
    Int64AsInt32,
    Float32,
    Float64,
    DateAsDays,
    DateTimeAsMillis,
    Str { width: u16 },
    CategoricalCodes,
}

pub(crate) struct PreparedColumn<'a> {
    pub meta: VarMeta,
    pub plan: CellPlan,
    pub source: &'a NamedColumn,
}

pub(crate) struct Prepared<'a> {
    pub columns: Vec<PreparedColumn<'a>>,
    pub label_sets: Vec<LabelSet>,
    pub row_width: usize,
}

// The writable i32 domain; the top of the range is reserved for sentinels.
const LONG_MIN: i64 = -2_147_483_647;
const LONG_MAX: i64 = 2_147_483_620;

// Strings at or past this width would need the strL heap, which the writer
// does not emit.
const STR_WIDTH_LIMIT: usize = 2045;

/// Stata caps variable names at 32 characters.
const NAME_CHAR_MAX: usize = 32;

/// Decides a storage type, display format, sanitized unique name, and value
/// labels for every representable column. Unrepresentable columns are
/// excluded, reported through the verbose channel when enabled.
pub(crate) fn prepare(table: &Table, verbose: bool) -> Prepared<'_> {
    let mut names = NameAllocator::default();
    let mut columns = Vec::with_capacity(table.width());
    let mut label_sets = Vec::new();
    let mut row_width = 0usize;

    for source in table.columns() {
        let (storage, plan) = match decide(source) {
            Ok(decision) => decision,
            Err(reason) => {
                if verbose {
                    logger::log_note(&format!(
                        "skipping column '{}' ({}): {reason}",
                        source.name,
                        source.data.type_name()
                    ));
                }
                continue;
            }
        };
        let mut meta = VarMeta {
            name: names.allocate(&source.name),
            storage,
            format: display_format(plan),
            label_set: String::new(),
            label: source.label.clone().unwrap_or_default(),
        };
        if let (CellPlan::CategoricalCodes, Column::Categorical(cells)) = (plan, &source.data) {
            let mut set = LabelSet::new(format!("fmt{}", columns.len() + 1));
            for (position, level) in cells.levels().iter().enumerate() {
                set.insert(position as i32, level.clone());
            }
            meta.label_set = set.name.clone();
            label_sets.push(set);
        }
        row_width += storage.cell_width();
        columns.push(PreparedColumn { meta, plan, source });
    }

    Prepared {
        columns,
        label_sets,
        row_width,
    }
}

fn decide(column: &NamedColumn) -> std::result::Result<(StorageType, CellPlan), String> {
    match &column.data {
        Column::Categorical(_) => Ok((StorageType::Long, CellPlan::CategoricalCodes)),
        Column::Bool(_) => Ok((StorageType::Byte, CellPlan::BoolAsInt8)),
        Column::Int8(_) => Ok((StorageType::Byte, CellPlan::Int8)),
        Column::Int16(_) => Ok((StorageType::Int, CellPlan::Int16)),
        Column::Int32(_) => Ok((StorageType::Long, CellPlan::Int32)),
        Column::Date(_) => Ok((StorageType::Long, CellPlan::DateAsDays)),
        Column::Int64(cells) => {
            if cells
                .iter()
                .flatten()
                .all(|value| (LONG_MIN..=LONG_MAX).contains(value))
            {
                Ok((StorageType::Long, CellPlan::Int64AsInt32))
            } else {
                Err(format!(
                    "values fall outside the representable long range [{LONG_MIN}, {LONG_MAX}]"
                ))
            }
        }
        Column::Float32(_) => Ok((StorageType::Float, CellPlan::Float32)),
        Column::Float64(_) => Ok((StorageType::Double, CellPlan::Float64)),
        Column::DateTime(_) => Ok((StorageType::Double, CellPlan::DateTimeAsMillis)),
        Column::Str(cells) => {
            let max_len = cells.iter().flatten().map(String::len).max().unwrap_or(0);
            // One byte is reserved for a trailing null.
            let width = max_len + 1;
            if width < STR_WIDTH_LIMIT {
                Ok((
                    StorageType::Str(width as u16),
                    CellPlan::Str {
                        width: width as u16,
                    },
                ))
            } else {
                Err(format!(
                    "string values of {max_len} bytes would need a strL heap, which the writer does not emit"
                ))
            }
        }
    }
}

fn display_format(plan: CellPlan) -> String {
    match plan {
        CellPlan::DateAsDays => "%tdNN-DD-CCYY".to_owned(),
        CellPlan::DateTimeAsMillis => "%tc".to_owned(),
        CellPlan::Str { width } => format!("%-{width}s"),
        CellPlan::Float32 => "%6.2f".to_owned(),
        CellPlan::Float64 => "%11.1f".to_owned(),
        CellPlan::Int8
        | CellPlan::BoolAsInt8
        | CellPlan::Int16
        | CellPlan::Int32
        | CellPlan::Int64AsInt32
        | CellPlan::CategoricalCodes => "%8.0g".to_owned(),
    }
}

#[derive(Default)]
struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    fn allocate(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        let mut candidate = base.clone();
        let mut counter = 0usize;
        while !self.taken.insert(candidate.clone()) {
            counter += 1;
            let suffix = format!("_{counter}");
            let keep = NAME_CHAR_MAX.saturating_sub(suffix.len());
            candidate = format!("{}{suffix}", truncate_chars(&base, keep));
        }
        candidate
    }
}

/// Rewrites a column name into `[A-Za-z_][A-Za-z0-9_]*`: an illegal first
/// character becomes `_`, as does any illegal later character.
fn sanitize(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len().min(NAME_CHAR_MAX));
    for (index, ch) in raw.chars().take(NAME_CHAR_MAX).enumerate() {
        let valid = if index == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        name.push(if valid { ch } else { '_' });
    }
    if name.is_empty() {
        name.push('_');
    }
    name
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
