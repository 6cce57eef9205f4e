use time::macros::date;
use time::{Date, Duration, PrimitiveDateTime, Time};

use crate::error::{Error, Result};

/// File format release, named after the Stata version that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Release 117 (Stata 13).
    V117,
    /// Release 118 (Stata 14).
    V118,
}

impl Release {
    /// Maps the decimal release number from the header envelope.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedVersion` for any release other than 117 or 118.
    pub const fn from_code(code: u16) -> Result<Self> {
        match code {
            117 => Ok(Self::V117),
            118 => Ok(Self::V118),
            release => Err(Error::UnsupportedVersion { release }),
        }
    }

    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::V117 => 117,
            Self::V118 => 118,
        }
    }

    /// Width in bytes of a variable-name field.
    #[must_use]
    pub const fn name_width(self) -> usize {
        match self {
            Self::V117 => 33,
            Self::V118 => 129,
        }
    }

    /// Width in bytes of a display-format field.
    #[must_use]
    pub const fn format_width(self) -> usize {
        match self {
            Self::V117 => 49,
            Self::V118 => 57,
        }
    }

    /// Width in bytes of a value-label-name field.
    #[must_use]
    pub const fn label_name_width(self) -> usize {
        match self {
            Self::V117 => 33,
            Self::V118 => 129,
        }
    }

    /// Width in bytes of a variable-label field.
    #[must_use]
    pub const fn variable_label_width(self) -> usize {
        match self {
            Self::V117 => 81,
            Self::V118 => 321,
        }
    }
}

/// On-disk storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Fixed-length string of the given byte width (1..=2045).
    Str(u16),
    /// Long-string reference into the strL heap.
    StrL,
    /// 64-bit float.
    Double,
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Long,
    /// 16-bit signed integer.
    Int,
    /// 8-bit signed integer.
    Byte,
}

pub const TYPE_CODE_STRL: u16 = 32768;
pub const TYPE_CODE_DOUBLE: u16 = 65526;
pub const TYPE_CODE_FLOAT: u16 = 65527;
pub const TYPE_CODE_LONG: u16 = 65528;
pub const TYPE_CODE_INT: u16 = 65529;
pub const TYPE_CODE_BYTE: u16 = 65530;

/// Largest fixed-string width the reader accepts.
pub const STR_WIDTH_MAX: u16 = 2045;

impl StorageType {
    /// Maps a 16-bit storage-type code onto the recognized set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidType` for any code outside the recognized set.
    pub const fn from_code(code: u16) -> Result<Self> {
        match code {
            1..=STR_WIDTH_MAX => Ok(Self::Str(code)),
            TYPE_CODE_STRL => Ok(Self::StrL),
            TYPE_CODE_DOUBLE => Ok(Self::Double),
            TYPE_CODE_FLOAT => Ok(Self::Float),
            TYPE_CODE_LONG => Ok(Self::Long),
            TYPE_CODE_INT => Ok(Self::Int),
            TYPE_CODE_BYTE => Ok(Self::Byte),
            code => Err(Error::InvalidType { code }),
        }
    }

    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Str(width) => width,
            Self::StrL => TYPE_CODE_STRL,
            Self::Double => TYPE_CODE_DOUBLE,
            Self::Float => TYPE_CODE_FLOAT,
            Self::Long => TYPE_CODE_LONG,
            Self::Int => TYPE_CODE_INT,
            Self::Byte => TYPE_CODE_BYTE,
        }
    }

    /// Bytes occupied by one cell of this type in the data body.
    #[must_use]
    pub const fn cell_width(self) -> usize {
        match self {
            Self::Str(width) => width as usize,
            Self::StrL | Self::Double => 8,
            Self::Float | Self::Long => 4,
            Self::Int => 2,
            Self::Byte => 1,
        }
    }
}

// Decode thresholds: any raw value strictly greater denotes missing.
pub const MISSING_ABOVE_INT8: i8 = 100;
pub const MISSING_ABOVE_INT16: i16 = 32_740;
pub const MISSING_ABOVE_INT32: i32 = 2_147_483_620;
pub const MISSING_ABOVE_FLOAT32: f32 = 1.701_411_733_19e38;
pub const MISSING_ABOVE_FLOAT64: f64 = 8.988_465_674_3e307;

// Canonical sentinels the encoder writes for a missing cell.
pub const SENTINEL_INT8: i8 = 101;
pub const SENTINEL_INT16: i16 = 32_741;
pub const SENTINEL_INT32: i32 = 2_147_483_621;
pub const SENTINEL_FLOAT32: f32 = 1.702e38;
pub const SENTINEL_FLOAT64: f64 = 8.989e307;

/// Interpretation a display format imposes on a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// Days since 1960-01-01.
    Date,
    /// Milliseconds since 1960-01-01 00:00:00.
    DateTime,
    /// No reinterpretation.
    Plain,
}

/// Classifies a display format by the prefixes the codec recognizes.
#[must_use]
pub fn classify_format(format: &str) -> FormatClass {
    if format == "%d" || format.starts_with("%td") {
        FormatClass::Date
    } else if format.starts_with("%tc") || format.starts_with("%tC") {
        FormatClass::DateTime
    } else {
        FormatClass::Plain
    }
}

/// The Stata calendar epoch.
pub const EPOCH_DATE: Date = date!(1960 - 01 - 01);
pub const EPOCH_DATETIME: PrimitiveDateTime = PrimitiveDateTime::new(EPOCH_DATE, Time::MIDNIGHT);

/// Resolves a day offset from the epoch into a calendar date.
///
/// Offsets outside the representable calendar range yield `None`.
#[must_use]
pub fn date_from_days(days: i32) -> Option<Date> {
    EPOCH_DATE.checked_add(Duration::days(i64::from(days)))
}

/// Day offset of a calendar date from the epoch.
#[must_use]
pub fn days_from_date(date: Date) -> i32 {
    let days = (date - EPOCH_DATE).whole_days();
    debug_assert!(i32::try_from(days).is_ok());
    days as i32
}

/// Resolves a millisecond offset from the epoch into a calendar datetime.
#[must_use]
pub fn datetime_from_millis(millis: f64) -> Option<PrimitiveDateTime> {
    if !millis.is_finite() {
        return None;
    }
    let rounded = millis.round();
    if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        return None;
    }
    EPOCH_DATETIME.checked_add(Duration::milliseconds(rounded as i64))
}

/// Millisecond offset of a calendar datetime from the epoch.
#[must_use]
pub fn millis_from_datetime(datetime: PrimitiveDateTime) -> f64 {
    (datetime - EPOCH_DATETIME).whole_milliseconds() as f64
}

/// Column descriptor assembled from the metadata sections.
#[derive(Debug, Clone)]
pub struct VarMeta {
    pub name: String,
    pub storage: StorageType,
    pub format: String,
    /// Name of the referenced value-label set; empty if none.
    pub label_set: String,
    /// Variable label; may be empty.
    pub label: String,
}

impl VarMeta {
    #[must_use]
    pub fn format_class(&self) -> FormatClass {
        classify_format(&self.format)
    }
}

/// A named dictionary mapping integer codes to label text.
///
/// Entries are kept in ascending code order, which is also the category
/// order Stata presents.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    pub name: String,
    entries: Vec<(i32, String)>,
}

impl LabelSet {
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Inserts or replaces the text for a code, preserving ascending order.
    pub fn insert(&mut self, code: i32, text: String) {
        match self.entries.binary_search_by_key(&code, |entry| entry.0) {
            Ok(index) => self.entries[index].1 = text,
            Err(index) => self.entries.insert(index, (code, text)),
        }
    }

    #[must_use]
    pub fn get(&self, code: i32) -> Option<&str> {
        self.entries
            .binary_search_by_key(&code, |entry| entry.0)
            .ok()
            .map(|index| self.entries[index].1.as_str())
    }

    #[must_use]
    pub fn entries(&self) -> &[(i32, String)] {
        &self.entries
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
