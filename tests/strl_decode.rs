mod common;

use common::{find, read_from_vec, write_to_vec};
use stata_dta::{Column, Error, ReadOptions, Table};

/// Builds a release-118 file carrying a strL column. The writer never emits
/// strLs, so a written f64 column is rebadged: its cells already hold the
/// desired `(v, o)` bit patterns, the storage code is patched to 32768, and
/// GSO records are spliced into the empty heap section.
fn strl_file(heap: &[(u32, u64, &[u8])]) -> Vec<u8> {
    let refs = [
        f64::from_bits((1 << 16) | 1), // (v: 1, o: 1)
        f64::from_bits((2 << 16) | 1), // (v: 1, o: 2)
        f64::from_bits(0),             // (0, 0): missing
    ];
    let mut table = Table::new();
    table
        .push("s", Column::Float64(refs.map(Some).to_vec()))
        .unwrap();
    let mut bytes = write_to_vec(&table);

    let type_at = find(&bytes, b"<variable_types>") + b"<variable_types>".len();
    bytes[type_at..type_at + 2].copy_from_slice(&32768u16.to_le_bytes());

    let mut records = Vec::new();
    for (v, o, payload) in heap {
        records.extend_from_slice(b"GSO");
        records.extend_from_slice(&v.to_le_bytes());
        records.extend_from_slice(&o.to_le_bytes());
        records.push(130);
        records.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        records.extend_from_slice(payload);
    }
    let at = find(&bytes, b"<strls>") + b"<strls>".len();
    bytes.splice(at..at, records);
    bytes
}

#[test]
fn strl_column_resolves_against_the_heap_and_pools() {
    let bytes = strl_file(&[(1, 1, b"alpha\0"), (1, 2, b"beta\0")]);
    let decoded = read_from_vec(bytes, &ReadOptions::new()).unwrap();
    let Column::Categorical(cells) = &decoded.column("s").unwrap().data else {
        panic!("expected a pooled strL column");
    };
    assert_eq!(cells.levels(), ["alpha", "beta"]);
    let values: Vec<Option<&str>> = cells.iter().collect();
    assert_eq!(values, vec![Some("alpha"), Some("beta"), None]);
}

#[test]
fn dangling_strl_reference_is_a_format_error() {
    let bytes = strl_file(&[(1, 1, b"alpha\0")]);
    let err = read_from_vec(bytes, &ReadOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
}
