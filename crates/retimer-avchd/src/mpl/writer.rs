//! In-place rewrite of clip timestamps.

use super::reader::date_label;
use super::{
    packed, ClipKind, MtsClipRecord, FIELDS_AT, ID_AT, KIND_AT, LABEL_AT, LABEL_LEN, SEPARATOR,
    SEPARATOR_AT, YEAR_AT,
};
use crate::{Error, Result};
use chrono::{Datelike, Timelike};
use std::io::{Read, Seek, SeekFrom, Write};

/// Packed bytes for one record, ready to be written at its anchor.
struct Encoded {
    anchor: u64,
    year: [u8; 2],
    fields: [u8; 5],
    label: [u8; LABEL_LEN],
}

fn encode(record: &MtsClipRecord) -> Result<Encoded> {
    let local = record.timestamp().local();

    let year = u32::try_from(local.year())
        .ok()
        .and_then(packed::encode::<2>)
        .ok_or(Error::FieldOutOfRange {
            field: "year",
            value: i64::from(local.year()),
        })?;

    let mut fields = [0u8; 5];
    let values = [
        local.month(),
        local.day(),
        local.hour(),
        local.minute(),
        local.second(),
    ];
    for (slot, value) in fields.iter_mut().zip(values) {
        // chrono keeps these below 100
        let [byte] = packed::encode::<1>(value).ok_or(Error::FieldOutOfRange {
            field: "timestamp",
            value: i64::from(value),
        })?;
        *slot = byte;
    }

    let text = date_label(local.year() as u32, local.month(), local.day());
    let label: [u8; LABEL_LEN] = text
        .as_bytes()
        .try_into()
        .map_err(|_| Error::FieldOutOfRange {
            field: "year",
            value: i64::from(local.year()),
        })?;

    Ok(Encoded {
        anchor: record.anchor(),
        year,
        fields,
        label,
    })
}

fn verify<F: Read + Seek>(file: &mut F, record: &MtsClipRecord) -> Result<()> {
    let anchor = record.anchor();
    let mut head = [0u8; KIND_AT + 2];
    file.seek(SeekFrom::Start(anchor))?;
    file.read_exact(&mut head)?;

    let id = u16::from_be_bytes([head[ID_AT], head[ID_AT + 1]]);
    if id != record.id().0 {
        return Err(Error::corruption(
            anchor,
            format!("expected clip {} at anchor, found {id:05}", record.id()),
        ));
    }
    if head[SEPARATOR_AT] != SEPARATOR {
        return Err(Error::corruption(
            anchor + SEPARATOR_AT as u64,
            "separator moved since decode",
        ));
    }
    let kind = [head[KIND_AT], head[KIND_AT + 1]];
    if ClipKind::from_bytes(kind).is_none() {
        return Err(Error::corruption(
            anchor + KIND_AT as u64,
            "kind marker changed since decode",
        ));
    }
    Ok(())
}

/// Rewrite the given records at their anchors.
///
/// Every record is encoded and every anchor re-verified before the first
/// byte is written, so a rejected batch leaves the file untouched.
pub(crate) fn write_records<F: Read + Write + Seek>(
    file: &mut F,
    records: &[&MtsClipRecord],
) -> Result<()> {
    let encoded = records
        .iter()
        .map(|record| encode(record))
        .collect::<Result<Vec<_>>>()?;

    for record in records {
        verify(file, record)?;
    }

    for e in &encoded {
        file.seek(SeekFrom::Start(e.anchor + YEAR_AT as u64))?;
        file.write_all(&e.year)?;
        file.seek(SeekFrom::Start(e.anchor + FIELDS_AT as u64))?;
        file.write_all(&e.fields)?;
        file.seek(SeekFrom::Start(e.anchor + LABEL_AT as u64))?;
        file.write_all(&e.label)?;
    }
    file.flush()?;
    Ok(())
}
