use std::borrow::Cow;
use std::fmt;
use std::io;

/// Result type used across the dta codec.
pub type Result<T> = std::result::Result<T, Error>;

/// High-level error type surfaced by the reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from or writing to the underlying stream.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file is malformed or inconsistent while processing a section.
    #[error("malformed dta file while processing {section}: {details}")]
    Format {
        section: Section,
        details: Cow<'static, str>,
    },

    /// File format release other than 117 or 118.
    #[error("unsupported dta release {release}; only 117 and 118 are supported")]
    UnsupportedVersion { release: u16 },

    /// Byte-order marker other than `LSF`.
    #[error("unsupported byte order '{marker}'; only LSF (little-endian) files are supported")]
    UnsupportedEndian { marker: String },

    /// Storage-type code outside the recognized set.
    #[error("unrecognized storage type code {code}")]
    InvalidType { code: u16 },
}

impl Error {
    pub(crate) fn format(section: Section, details: impl Into<Cow<'static, str>>) -> Self {
        Self::Format {
            section,
            details: details.into(),
        }
    }
}

/// Logical section of the file used for diagnostic reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Map,
    VariableTypes,
    VariableNames,
    SortList,
    Formats,
    ValueLabelNames,
    VariableLabels,
    Characteristics,
    Data { row: u64 },
    Strls,
    ValueLabels,
    Trailer,
    Table,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "file header"),
            Self::Map => write!(f, "section offset map"),
            Self::VariableTypes => write!(f, "variable types"),
            Self::VariableNames => write!(f, "variable names"),
            Self::SortList => write!(f, "sort list"),
            Self::Formats => write!(f, "display formats"),
            Self::ValueLabelNames => write!(f, "value-label names"),
            Self::VariableLabels => write!(f, "variable labels"),
            Self::Characteristics => write!(f, "characteristics"),
            Self::Data { row } => write!(f, "data row {row}"),
            Self::Strls => write!(f, "strL heap"),
            Self::ValueLabels => write!(f, "value labels"),
            Self::Trailer => write!(f, "file trailer"),
            Self::Table => write!(f, "in-memory table"),
        }
    }
}
