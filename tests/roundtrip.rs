mod common;

use common::{find, read_from_vec, write_to_vec};
use stata_dta::{Categorical, Column, DtaFile, ReadOptions, Table};
use std::io::Cursor;
use time::macros::{date, datetime};

fn owned(values: &[Option<&str>]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|value| value.map(str::to_owned))
        .collect()
}

#[test]
fn int8_values_and_missing_round_trip() {
    let mut table = Table::new();
    table
        .push("x", Column::Int8(vec![Some(1), Some(2), None, Some(100)]))
        .unwrap();

    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    assert_eq!(
        decoded.column("x").unwrap().data,
        Column::Int8(vec![Some(1), Some(2), None, Some(100)])
    );
}

#[test]
fn int8_above_threshold_decodes_as_missing() {
    // 101 is the canonical byte sentinel; a present 101 cannot survive.
    let mut table = Table::new();
    table
        .push("x", Column::Int8(vec![Some(101), Some(127)]))
        .unwrap();
    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    assert_eq!(decoded.column("x").unwrap().data, Column::Int8(vec![None, None]));
}

#[test]
fn date_column_storage_and_round_trip() {
    let mut table = Table::new();
    table
        .push(
            "d",
            Column::Date(vec![
                Some(date!(1960 - 01 - 01)),
                Some(date!(1960 - 01 - 02)),
                Some(date!(2020 - 06 - 15)),
            ]),
        )
        .unwrap();
    let bytes = write_to_vec(&table);

    let file = DtaFile::from_reader(Cursor::new(bytes.clone())).unwrap();
    let var = &file.variables()[0];
    assert_eq!(var.storage.code(), 65528);
    assert_eq!(var.format, "%tdNN-DD-CCYY");

    let data_at = find(&bytes, b"<data>") + b"<data>".len();
    let stored: Vec<i32> = (0..3)
        .map(|row| {
            let at = data_at + row * 4;
            i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
        })
        .collect();
    assert_eq!(stored, vec![0, 1, 22081]);

    let decoded = file.into_table(&ReadOptions::new()).unwrap();
    assert_eq!(decoded.column("d").unwrap().data, table.column("d").unwrap().data);
}

#[test]
fn categorical_text_round_trips_with_dictionary_order() {
    let mut table = Table::new();
    table
        .push(
            "g",
            Column::Categorical(Categorical::from_values(owned(&[
                Some("a"),
                Some("b"),
                Some("a"),
                Some("c"),
            ]))),
        )
        .unwrap();
    let bytes = write_to_vec(&table);

    let file = DtaFile::from_reader(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(file.variables()[0].storage.code(), 65528);
    assert_eq!(file.variables()[0].label_set, "fmt1");

    let data_at = find(&bytes, b"<data>") + b"<data>".len();
    let stored: Vec<i32> = (0..4)
        .map(|row| {
            let at = data_at + row * 4;
            i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
        })
        .collect();
    assert_eq!(stored, vec![0, 1, 0, 2]);

    let decoded = file.into_table(&ReadOptions::new()).unwrap();
    let Column::Categorical(cells) = &decoded.column("g").unwrap().data else {
        panic!("expected categorical column");
    };
    assert_eq!(cells.levels(), ["a", "b", "c"]);
    let values: Vec<Option<&str>> = cells.iter().collect();
    assert_eq!(values, vec![Some("a"), Some("b"), Some("a"), Some("c")]);
}

#[test]
fn keep_original_prefixes_every_category_with_its_code() {
    let mut table = Table::new();
    table
        .push(
            "g",
            Column::Categorical(Categorical::from_values(owned(&[
                Some("low"),
                Some("high"),
                None,
            ]))),
        )
        .unwrap();
    let decoded = read_from_vec(
        write_to_vec(&table),
        &ReadOptions::new().with_keep_original(true),
    )
    .unwrap();
    let Column::Categorical(cells) = &decoded.column("g").unwrap().data else {
        panic!("expected categorical column");
    };
    assert_eq!(cells.levels(), ["0: high", "1: low"]);
    assert_eq!(cells.value_at(2), None);
}

#[test]
fn every_cell_marked_missing_stays_missing() {
    let mut table = Table::new();
    table
        .push("b", Column::Bool(vec![Some(true), None, Some(false)]))
        .unwrap();
    table.push("i1", Column::Int8(vec![Some(7), None, Some(-3)])).unwrap();
    table
        .push("i2", Column::Int16(vec![None, Some(32_740), Some(-9)]))
        .unwrap();
    table
        .push("i4", Column::Int32(vec![Some(123_456), None, Some(-1)]))
        .unwrap();
    table
        .push("i8", Column::Int64(vec![Some(-5), Some(2_147_483_620), None]))
        .unwrap();
    table
        .push("f4", Column::Float32(vec![Some(1.5), None, Some(-2.25)]))
        .unwrap();
    table
        .push("f8", Column::Float64(vec![None, Some(0.125), Some(-1e100)]))
        .unwrap();
    table
        .push("s", Column::Str(owned(&[Some("caf\u{e9}"), None, Some("ok")])))
        .unwrap();
    table
        .push(
            "d",
            Column::Date(vec![Some(date!(1900 - 02 - 28)), None, Some(date!(2100 - 01 - 01))]),
        )
        .unwrap();
    table
        .push(
            "t",
            Column::DateTime(vec![
                Some(datetime!(2020 - 06 - 15 12:34:56.789)),
                None,
                Some(datetime!(1959 - 01 - 01 00:00:00)),
            ]),
        )
        .unwrap();

    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    assert_eq!(decoded.width(), 10);
    assert_eq!(decoded.height(), 3);

    // Bool narrows to i8 and i64 narrows to the smallest fitting Stata type.
    assert_eq!(
        decoded.column("b").unwrap().data,
        Column::Int8(vec![Some(1), None, Some(0)])
    );
    assert_eq!(
        decoded.column("i8").unwrap().data,
        Column::Int32(vec![Some(-5), Some(2_147_483_620), None])
    );
    assert_eq!(decoded.column("i1").unwrap().data, table.column("i1").unwrap().data);
    assert_eq!(decoded.column("i2").unwrap().data, table.column("i2").unwrap().data);
    assert_eq!(decoded.column("i4").unwrap().data, table.column("i4").unwrap().data);
    assert_eq!(decoded.column("f4").unwrap().data, table.column("f4").unwrap().data);
    assert_eq!(decoded.column("f8").unwrap().data, table.column("f8").unwrap().data);
    assert_eq!(decoded.column("s").unwrap().data, table.column("s").unwrap().data);
    assert_eq!(decoded.column("d").unwrap().data, table.column("d").unwrap().data);
    assert_eq!(decoded.column("t").unwrap().data, table.column("t").unwrap().data);
}

#[test]
fn metadata_is_available_before_the_body_is_decoded() {
    let mut table = Table::new();
    table
        .push_labeled("age", "Age in years", Column::Int16(vec![Some(30), Some(41)]))
        .unwrap();
    let bytes = write_to_vec(&table);

    let file = DtaFile::from_reader(Cursor::new(bytes)).unwrap();
    let metadata = file.metadata();
    assert_eq!(metadata.release().code(), 118);
    assert_eq!(metadata.row_count(), 2);
    assert_eq!(metadata.var_count(), 1);
    assert_eq!(metadata.dataset_label(), "");
    assert_eq!(metadata.timestamp().len(), 17);
    assert_eq!(metadata.variables()[0].name, "age");
    assert_eq!(metadata.variables()[0].label, "Age in years");

    let decoded = file.into_table(&ReadOptions::new()).unwrap();
    assert_eq!(decoded.height(), 2);
}

#[test]
fn variable_labels_are_attached_on_read() {
    let mut table = Table::new();
    table
        .push_labeled("age", "Age in years", Column::Int16(vec![Some(30), Some(41)]))
        .unwrap();
    table.push("raw", Column::Int8(vec![Some(0), Some(1)])).unwrap();

    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    assert_eq!(
        decoded.column("age").unwrap().label.as_deref(),
        Some("Age in years")
    );
    assert_eq!(decoded.column("raw").unwrap().label, None);
}

#[test]
fn empty_strings_decode_as_missing() {
    let mut table = Table::new();
    table
        .push("s", Column::Str(owned(&[Some(""), Some("x")])))
        .unwrap();
    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    assert_eq!(
        decoded.column("s").unwrap().data,
        Column::Str(owned(&[None, Some("x")]))
    );
}

#[test]
fn chunk_count_does_not_change_the_result() {
    let mut table = Table::new();
    let rows: Vec<Option<f64>> = (0..1000).map(|i| Some(f64::from(i) / 8.0)).collect();
    table.push("v", Column::Float64(rows)).unwrap();
    let bytes = write_to_vec(&table);

    let reference = read_from_vec(bytes.clone(), &ReadOptions::new().with_chunks(1)).unwrap();
    for chunks in [2, 5, 10, 37] {
        let decoded =
            read_from_vec(bytes.clone(), &ReadOptions::new().with_chunks(chunks)).unwrap();
        assert_eq!(decoded, reference);
    }
}

#[test]
fn column_names_are_sanitized_and_uniquified() {
    let mut table = Table::new();
    table.push("2nd value", Column::Int8(vec![Some(1)])).unwrap();
    table.push("2nd_value", Column::Int8(vec![Some(2)])).unwrap();
    let decoded = read_from_vec(write_to_vec(&table), &ReadOptions::new()).unwrap();
    let names: Vec<&str> = decoded.names().collect();
    assert_eq!(names, vec!["_nd_value", "_nd_value_1"]);
}
