//! Playlist reader.

use super::{
    packed, ClipId, ClipKind, ClipTimestamp, MtsClipRecord, COUNT_OFFSET, DESCRIPTOR_LEN,
    DESCRIPTOR_PREFIX_LEN, FIELDS_AT, ID_AT, KIND_AT, LABEL_AT, LABEL_LEN, RECORD_LEN, SEPARATOR,
    SEPARATOR_AT, SIGNATURE, TIMESTAMP_MARKER, TRAILER_LEN, YEAR_AT,
};
use crate::sidecar::TimezoneSidecar;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::io::{Read, Seek, SeekFrom};

/// Playlist reader over any seekable byte source.
pub struct MplReader<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> MplReader<R> {
    /// Create a new playlist reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Length of the underlying source.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Decode every clip descriptor, attaching offsets found in `sidecar`.
    pub fn read_records(&mut self, sidecar: &TimezoneSidecar) -> Result<Vec<MtsClipRecord>> {
        self.check_signature()?;
        let count = u64::from(self.read_count()?);

        let span = TRAILER_LEN + DESCRIPTOR_LEN * count;
        let first = self.file_size.checked_sub(span).ok_or_else(|| {
            Error::corruption(
                0,
                format!(
                    "{count} clip descriptors do not fit in {} bytes",
                    self.file_size
                ),
            )
        })?;

        let mut records = Vec::with_capacity(count as usize);
        for index in 0..count {
            let base = first + index * DESCRIPTOR_LEN;
            records.push(self.read_descriptor(base, sidecar)?);
        }
        Ok(records)
    }

    fn check_signature(&mut self) -> Result<()> {
        let mut magic = [0u8; 8];
        if self.file_size < magic.len() as u64 {
            return Err(Error::not_mpl(format!(
                "file is only {} bytes",
                self.file_size
            )));
        }
        self.reader.seek(SeekFrom::Start(0))?;
        self.reader.read_exact(&mut magic)?;
        if &magic != SIGNATURE {
            return Err(Error::not_mpl(format!(
                "signature {}",
                String::from_utf8_lossy(&magic)
            )));
        }
        Ok(())
    }

    fn read_count(&mut self) -> Result<u8> {
        if self.file_size <= COUNT_OFFSET {
            return Err(Error::corruption(COUNT_OFFSET, "header truncated"));
        }
        self.reader.seek(SeekFrom::Start(COUNT_OFFSET))?;
        let mut count = [0u8; 1];
        self.reader.read_exact(&mut count)?;
        Ok(count[0])
    }

    fn read_descriptor(&mut self, base: u64, sidecar: &TimezoneSidecar) -> Result<MtsClipRecord> {
        let mut block = [0u8; DESCRIPTOR_LEN as usize];
        self.reader.seek(SeekFrom::Start(base))?;
        self.reader.read_exact(&mut block)?;

        let marker_end = DESCRIPTOR_PREFIX_LEN + TIMESTAMP_MARKER.len();
        if block[DESCRIPTOR_PREFIX_LEN..marker_end] != TIMESTAMP_MARKER {
            return Err(Error::corruption(
                base + DESCRIPTOR_PREFIX_LEN as u64,
                "timestamp marker mismatch",
            ));
        }

        let anchor = base + marker_end as u64;
        let record = &block[marker_end..marker_end + RECORD_LEN];
        decode_record(record, anchor, sidecar)
    }
}

/// Decode the 22 bytes following the timestamp marker.
pub(crate) fn decode_record(
    record: &[u8],
    anchor: u64,
    sidecar: &TimezoneSidecar,
) -> Result<MtsClipRecord> {
    let at = |field: usize| anchor + field as u64;

    let id = ClipId(u16::from_be_bytes([record[ID_AT], record[ID_AT + 1]]));

    if record[SEPARATOR_AT] != SEPARATOR {
        return Err(Error::corruption(
            at(SEPARATOR_AT),
            format!("expected separator 0x1e, found {:#04x}", record[SEPARATOR_AT]),
        ));
    }

    let year = packed::decode(&record[YEAR_AT..YEAR_AT + 2])
        .ok_or_else(|| Error::corruption(at(YEAR_AT), "year is not packed decimal"))?;

    let mut fields = [0u32; 5];
    for (i, slot) in fields.iter_mut().enumerate() {
        *slot = packed::decode(&record[FIELDS_AT + i..FIELDS_AT + i + 1]).ok_or_else(|| {
            Error::corruption(at(FIELDS_AT + i), "timestamp field is not packed decimal")
        })?;
    }
    let [month, day, hour, minute, second] = fields;

    let local = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            Error::corruption(
                at(YEAR_AT),
                format!("impossible timestamp {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"),
            )
        })?;

    let kind = ClipKind::from_bytes([record[KIND_AT], record[KIND_AT + 1]]).ok_or_else(|| {
        Error::corruption(
            at(KIND_AT),
            format!(
                "unrecognized kind marker {:02x}{:02x}",
                record[KIND_AT],
                record[KIND_AT + 1]
            ),
        )
    })?;

    let expected = date_label(year, month, day);
    let label = &record[LABEL_AT..LABEL_AT + LABEL_LEN];
    if label != expected.as_bytes() {
        return Err(Error::corruption(
            at(LABEL_AT),
            format!(
                "date label {:?} does not match {:?}",
                String::from_utf8_lossy(label),
                expected
            ),
        ));
    }

    let timestamp = ClipTimestamp::new(local, sidecar.offset(id));
    Ok(MtsClipRecord::new(id, anchor, kind, timestamp))
}

/// The ASCII date confirmation string, space padded.
pub(crate) fn date_label(year: u32, month: u32, day: u32) -> String {
    format!("{year:4}.{month:2}.{day:2}")
}

#[cfg(test)]
mod tests {
    use super::super::fixture::*;
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: Vec<u8>) -> Result<Vec<MtsClipRecord>> {
        MplReader::new(Cursor::new(bytes))?.read_records(&TimezoneSidecar::default())
    }

    #[test]
    fn test_date_label_is_space_padded() {
        assert_eq!(date_label(2021, 6, 1), "2021. 6. 1");
        assert_eq!(date_label(2019, 12, 31), "2019.12.31");
    }

    #[test]
    fn test_decode_clip() {
        let bytes = playlist(&[(127, ts("2021-06-01 10:00:00"))]);
        let records = decode(bytes).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id().to_string(), "00127.MTS");
        assert_eq!(record.anchor(), anchor_of(0) as u64);
        assert_eq!(record.kind().bytes(), [0x90, 0x0A]);
        assert_eq!(
            record.timestamp(),
            ClipTimestamp::Naive(ts("2021-06-01 10:00:00"))
        );
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_decode_ignores_header_content() {
        let mut bytes = playlist(&[(1, ts("2020-01-01 00:00:00")), (2, ts("2020-01-02 00:00:00"))]);
        for b in &mut bytes[8..COUNT_OFFSET as usize] {
            *b = 0x5A;
        }
        let records = decode(bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id(), ClipId(2));
    }

    #[test]
    fn test_decode_empty_playlist() {
        let records = decode(playlist(&[])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_wrong_signature_is_format_error() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[4..8].copy_from_slice(b"0200");
        assert!(decode(bytes).unwrap_err().is_format());

        assert!(decode(b"MPL".to_vec()).unwrap_err().is_format());
    }

    #[test]
    fn test_too_short_for_count_is_corruption() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[COUNT_OFFSET as usize] = 40;
        assert!(matches!(
            decode(bytes).unwrap_err(),
            Error::Corruption { offset: 0, .. }
        ));
    }

    #[test]
    fn test_marker_mismatch() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[anchor_of(0) - 1] = 0x03;
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, Error::Corruption { offset, .. } if offset == (anchor_of(0) - 8) as u64));
    }

    #[test]
    fn test_separator_mismatch() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[anchor_of(0) + SEPARATOR_AT] = 0x1F;
        assert!(decode(bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_invalid_packed_digit() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[anchor_of(0) + FIELDS_AT + 2] = 0x1A;
        let err = decode(bytes).unwrap_err();
        assert!(err.to_string().contains("not packed decimal"));
    }

    #[test]
    fn test_impossible_date() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        // February 30th
        bytes[anchor_of(0) + FIELDS_AT] = 0x02;
        bytes[anchor_of(0) + FIELDS_AT + 1] = 0x30;
        assert!(decode(bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_unrecognized_kind() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        bytes[anchor_of(0) + KIND_AT + 1] = 0x0B;
        let err = decode(bytes).unwrap_err();
        assert!(err.to_string().contains("kind marker 900b"));
    }

    #[test]
    fn test_label_mismatch() {
        let mut bytes = playlist(&[(1, ts("2021-06-01 10:00:00"))]);
        let at = anchor_of(0) + LABEL_AT;
        bytes[at..at + LABEL_LEN].copy_from_slice(b"2021.06.01");
        assert!(decode(bytes).unwrap_err().is_corruption());
    }
}
