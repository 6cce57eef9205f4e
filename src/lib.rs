//! Reader and writer for Stata `.dta` files, format releases 117 and 118
//! (Stata 13 and 14).
//!
//! Decoding materializes a [`Table`] of typed, optionally-labeled columns;
//! encoding consumes a [`Table`] and produces a release-118 file. Large data
//! bodies are read in chunks so the whole payload never has to be resident
//! at once.

pub mod api;
pub mod error;
pub mod frame;
pub mod logger;
pub mod parser;
pub mod schema;
mod writer;

pub use api::{
    DtaFile, Metadata, ReadOptions, WriteOptions, read, read_with_options, write, write_into,
    write_with_options,
};
pub use error::{Error, Result};
pub use frame::{Categorical, Column, NamedColumn, Table};
