//! Synthetic apartment data shared by unit tests

use crate::models::{RawRecord, RawTable, RawValue};

fn yes_no(flag: bool) -> RawValue {
    if flag { "yes" } else { "no" }.into()
}

/// One deterministic apartment row with a rent driven by area, bedrooms and age
pub(crate) fn apartment(i: usize) -> RawRecord {
    let area = 40 + (i * 7) % 80;
    let year = 1960 + (i * 13) % 60;
    let bedrooms = 1 + i % 4;
    let balcony = i % 2 == 0;
    let garden = if i % 3 == 0 {
        "Not present".to_string()
    } else {
        format!("Present ({} m²)", 5 + i % 25)
    };
    let rent = 500 + area * 12 + bedrooms * 100 + (year - 1960) * 3 + if balcony { 80 } else { 0 };

    let mut record = RawRecord::new();
    record.insert("address".into(), RawValue::Text(format!("Canal Street {}", i)));
    record.insert("area".into(), (area as i64).into());
    record.insert("construction_year".into(), (year as i64).into());
    record.insert("bedrooms".into(), (bedrooms as i64).into());
    record.insert("garden".into(), RawValue::Text(garden));
    record.insert("balcony".into(), yes_no(balcony));
    record.insert("parking".into(), yes_no(i % 3 != 0));
    record.insert("furnished".into(), yes_no(i % 4 == 0));
    record.insert("garage".into(), yes_no(i % 5 == 0));
    record.insert("storage".into(), yes_no(i % 2 == 1));
    record.insert("neighborhood".into(), if i % 2 == 0 { "Centrum" } else { "Oost" }.into());
    record.insert("rent".into(), (rent as i64).into());
    record
}

pub(crate) fn apartments_table(n: usize) -> RawTable {
    let records: Vec<RawRecord> = (0..n).map(apartment).collect();
    RawTable::from_records(&records).expect("fixture records share columns")
}
