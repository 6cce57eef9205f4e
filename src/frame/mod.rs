mod categorical;

pub use categorical::Categorical;

use time::{Date, PrimitiveDateTime};

use crate::error::{Error, Result, Section};

/// A single column of cell data. Every cell may be missing.
///
/// `Int64` and `Bool` columns are accepted on write, where they narrow to a
/// Stata storage type or are excluded; decoding never produces them.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int8(Vec<Option<i8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Str(Vec<Option<String>>),
    Date(Vec<Option<Date>>),
    DateTime(Vec<Option<PrimitiveDateTime>>),
    Categorical(Categorical),
}

impl Column {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(cells) => cells.len(),
            Self::Int16(cells) => cells.len(),
            Self::Int32(cells) => cells.len(),
            Self::Int64(cells) => cells.len(),
            Self::Bool(cells) => cells.len(),
            Self::Float32(cells) => cells.len(),
            Self::Float64(cells) => cells.len(),
            Self::Str(cells) => cells.len(),
            Self::Date(cells) => cells.len(),
            Self::DateTime(cells) => cells.len(),
            Self::Categorical(cells) => cells.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element-type name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int8(_) => "i8",
            Self::Int16(_) => "i16",
            Self::Int32(_) => "i32",
            Self::Int64(_) => "i64",
            Self::Bool(_) => "bool",
            Self::Float32(_) => "f32",
            Self::Float64(_) => "f64",
            Self::Str(_) => "str",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Categorical(_) => "categorical",
        }
    }
}

/// A column together with its name and optional variable label.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedColumn {
    pub name: String,
    pub label: Option<String>,
    pub data: Column,
}

/// An ordered sequence of named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<NamedColumn>,
}

impl Table {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length differs from the table height.
    pub fn push(&mut self, name: impl Into<String>, data: Column) -> Result<()> {
        self.push_named(NamedColumn {
            name: name.into(),
            label: None,
            data,
        })
    }

    /// Appends a column carrying a variable label.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length differs from the table height.
    pub fn push_labeled(
        &mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        data: Column,
    ) -> Result<()> {
        self.push_named(NamedColumn {
            name: name.into(),
            label: Some(label.into()),
            data,
        })
    }

    pub(crate) fn push_named(&mut self, column: NamedColumn) -> Result<()> {
        if let Some(first) = self.columns.first()
            && first.data.len() != column.data.len()
        {
            return Err(Error::format(
                Section::Table,
                format!(
                    "column '{}' has {} rows but the table has {}",
                    column.name,
                    column.data.len(),
                    first.data.len()
                ),
            ));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |column| column.data.len())
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn columns(&self) -> &[NamedColumn] {
        &self.columns
    }

    /// Looks a column up by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&NamedColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}
