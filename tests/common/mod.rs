#![allow(dead_code)]

use std::io::Cursor;

use stata_dta::{DtaFile, ReadOptions, Table, WriteOptions, write_into};

pub fn write_to_vec(table: &Table) -> Vec<u8> {
    let mut sink = Cursor::new(Vec::new());
    write_into(&mut sink, table, &WriteOptions::new().with_verbose(false))
        .expect("in-memory encode");
    sink.into_inner()
}

pub fn read_from_vec(bytes: Vec<u8>, options: &ReadOptions) -> stata_dta::Result<Table> {
    DtaFile::from_reader(Cursor::new(bytes))?.into_table(options)
}

pub fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
        .unwrap_or_else(|| panic!("marker {:?} not found", String::from_utf8_lossy(needle)))
}
