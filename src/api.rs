use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::frame::Table;
use crate::parser::{self, FileHeader};
use crate::schema::{Release, VarMeta};
use crate::writer;

/// Configures memory usage and categorical rendering for decoding.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    chunks: usize,
    keep_original: bool,
}

impl ReadOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunks: 10,
            keep_original: false,
        }
    }

    /// Number of slabs a large data body is read in. This is a memory
    /// strategy only; every value produces the same table.
    #[must_use]
    pub const fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    /// Keeps raw numeric codes visible in the category text of labeled
    /// columns, rendering each category as `code: label`.
    #[must_use]
    pub const fn with_keep_original(mut self, keep_original: bool) -> Self {
        self.keep_original = keep_original;
        self
    }

    pub(crate) const fn chunks(&self) -> usize {
        self.chunks
    }

    pub(crate) const fn keep_original(&self) -> bool {
        self.keep_original
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures buffering and diagnostics for encoding.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    max_buffer: usize,
    verbose: bool,
}

impl WriteOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_buffer: 10_000,
            verbose: true,
        }
    }

    /// Caps the row-assembly buffer size in bytes; rows are flushed in
    /// groups once the buffer reaches this size.
    #[must_use]
    pub const fn with_max_buffer(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    /// Reports excluded columns on standard output.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub(crate) const fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    pub(crate) const fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything known about a `.dta` file before its data body is decoded:
/// the header envelope and the per-variable descriptors.
#[derive(Debug, Clone)]
pub struct Metadata {
    header: FileHeader,
    variables: Vec<VarMeta>,
}

impl Metadata {
    #[must_use]
    pub const fn release(&self) -> Release {
        self.header.release
    }

    /// Observation count declared by the header.
    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.header.row_count
    }

    #[must_use]
    pub const fn var_count(&self) -> u16 {
        self.header.var_count
    }

    /// Dataset label; not preserved on round-trip.
    #[must_use]
    pub fn dataset_label(&self) -> &str {
        &self.header.dataset_label
    }

    /// Creation timestamp as recorded in the file.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.header.timestamp
    }

    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Column descriptors in file order.
    #[must_use]
    pub fn variables(&self) -> &[VarMeta] {
        &self.variables
    }
}

/// A `.dta` file whose header and metadata have been decoded, positioned to
/// decode the data body on demand.
pub struct DtaFile<R: Read + Seek> {
    reader: R,
    metadata: Metadata,
}

impl DtaFile<BufReader<File>> {
    /// Opens a `.dta` file from disk and decodes its header and metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header or
    /// metadata sections are malformed or unsupported.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> DtaFile<R> {
    /// Builds a handle from any `Read + Seek` implementor positioned at the
    /// start of a `.dta` stream.
    ///
    /// # Errors
    ///
    /// Returns an error if header or metadata decoding fails.
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let header = parser::read_header(&mut reader)?;
        let variables = parser::read_metadata(&mut reader, &header)?;
        Ok(Self {
            reader,
            metadata: Metadata { header, variables },
        })
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        self.metadata.header()
    }

    /// Column descriptors in file order.
    #[must_use]
    pub fn variables(&self) -> &[VarMeta] {
        self.metadata.variables()
    }

    /// Decodes the data body and materializes the table, consuming the
    /// handle. The table is fully materialized before return; no references
    /// into the file remain.
    ///
    /// # Errors
    ///
    /// Returns an error if any remaining section is malformed.
    pub fn into_table(mut self, options: &ReadOptions) -> Result<Table> {
        parser::decode_stream(
            &mut self.reader,
            &self.metadata.header,
            &self.metadata.variables,
            options.chunks() as u64,
            options.keep_original(),
            parser::WHOLE_BODY_LIMIT,
        )
    }
}

/// Decodes a `.dta` file into a table with default options.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Table> {
    read_with_options(path, &ReadOptions::new())
}

/// Decodes a `.dta` file into a table.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn read_with_options<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Table> {
    DtaFile::open(path)?.into_table(options)
}

/// Encodes a table to a `.dta` file with default options. Paths without the
/// `.dta` suffix get it appended.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    write_with_options(path, table, &WriteOptions::new())
}

/// Encodes a table to a `.dta` file. Paths without the `.dta` suffix get it
/// appended.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_with_options<P: AsRef<Path>>(
    path: P,
    table: &Table,
    options: &WriteOptions,
) -> Result<()> {
    let path = ensure_dta_suffix(path.as_ref());
    let file = File::create(&path)?;
    let mut sink = BufWriter::new(file);
    writer::write_table(&mut sink, table, options)?;
    sink.flush()?;
    Ok(())
}

/// Encodes a table into any seekable sink.
///
/// # Errors
///
/// Returns an error if the sink fails; a partial file may remain.
pub fn write_into<W: Write + Seek>(sink: &mut W, table: &Table, options: &WriteOptions) -> Result<()> {
    writer::write_table(sink, table, options)
}

fn ensure_dta_suffix(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new("dta")) {
        path.to_owned()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".dta");
        PathBuf::from(name)
    }
}
