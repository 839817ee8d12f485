//! Session-level reconciliation and write-back over the in-memory backend.

mod common;

use chrono::{DateTime, FixedOffset, TimeDelta};
use common::{memory_session, touch};
use retimer::{PassKind, TimestampSource};
use retimer_common::time::parse_offset;
use retimer_tags::TagId;

fn aware(text: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(text).unwrap()
}

#[test]
fn test_source_priority() {
    let dir = tempfile::tempdir().unwrap();
    let photo = touch(dir.path(), "a.jpg");
    let movie = touch(dir.path(), "b.mov");
    let bare = touch(dir.path(), "c.png");

    let (mut session, backend) = memory_session();
    backend.insert(&photo, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");
    backend.insert(&photo, TagId::ExifTimeZoneOffset, "2");
    backend.insert(&photo, TagId::QuickTimeCreateDate, "2001:01:01 00:00:00");
    backend.insert(&movie, TagId::QuickTimeCreateDate, "2020:06:01 08:00:00");

    session.add_files([photo.clone(), movie.clone(), bare.clone()]);
    assert!(session.reload().finish().is_empty());

    let photo = session.file(&photo).unwrap();
    assert_eq!(photo.source, Some(TimestampSource::ExifOriginal));
    assert_eq!(photo.timestamp, Some(aware("2020-06-01T10:00:00+02:00")));

    let movie = session.file(&movie).unwrap();
    assert_eq!(movie.source, Some(TimestampSource::QuickTime));
    assert_eq!(movie.timestamp, Some(aware("2020-06-01T08:00:00Z")));

    let bare = session.file(&bare).unwrap();
    assert_eq!(bare.source, Some(TimestampSource::FileModified));
    assert_eq!(bare.timestamp, bare.mtime);
}

#[test]
fn test_offset_inferred_from_xmp() {
    let dir = tempfile::tempdir().unwrap();
    let with_xmp = touch(dir.path(), "a.jpg");
    let without = touch(dir.path(), "b.jpg");

    let (mut session, backend) = memory_session();
    backend.insert(&with_xmp, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");
    backend.insert(&with_xmp, TagId::XmpCreateDate, "2020-06-01T09:00:00Z");
    backend.insert(&without, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");

    session.add_files([with_xmp.clone(), without.clone()]);
    assert!(session.reload().finish().is_empty());

    let file = session.file(&with_xmp).unwrap();
    assert_eq!(file.exif_offset().local_minus_utc(), 3600);
    assert_eq!(file.timestamp, Some(aware("2020-06-01T10:00:00+01:00")));

    let file = session.file(&without).unwrap();
    assert_eq!(file.exif_offset().local_minus_utc(), 0);
}

#[test]
fn test_second_write_after_reload_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let photo = touch(dir.path(), "a.jpg");

    let (mut session, backend) = memory_session();
    backend.insert(&photo, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");
    backend.insert(&photo, TagId::ExifTimeZoneOffset, "1");
    backend.insert(&photo, TagId::XmpCreateDate, "2020-06-01T10:00:00+01:00");
    session.set_target_offset(parse_offset("+01:00").unwrap());
    session.add_files([photo.clone()]);
    assert!(session.reload().finish().is_empty());

    session.set_default_delta(TimeDelta::minutes(30));
    assert!(session.write_back().finish().is_empty());
    assert_eq!(
        backend.value(&photo, TagId::ExifDateTimeOriginal).as_deref(),
        Some("2020:06:01 10:30:00")
    );
    assert_eq!(
        backend.value(&photo, TagId::XmpCreateDate).as_deref(),
        Some("2020-06-01T10:30:00+01:00")
    );
    let writes = backend.write_count();

    // Writing again without a reload is refused.
    let failures = session.write_back().finish();
    assert_eq!(failures.len(), 1);

    assert!(session.reload().finish().is_empty());
    assert_eq!(session.default_delta(), TimeDelta::zero());
    assert!(session.write_back().finish().is_empty());
    assert_eq!(backend.write_count(), writes);
    assert!(!session.file(&photo).unwrap().is_written());
}

#[test]
fn test_anchors_interpolate_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, backend) = memory_session();
    let paths: Vec<_> = (0..3)
        .map(|i| {
            let path = touch(dir.path(), &format!("{i}.jpg"));
            backend.insert(&path, TagId::ExifDateTimeOriginal, format!("2020:06:01 1{i}:00:00"));
            backend.insert(&path, TagId::ExifTimeZoneOffset, "0");
            path
        })
        .collect();
    session.add_files(paths.clone());
    assert!(session.reload().finish().is_empty());

    session.lock(&paths[0]).unwrap();
    session
        .set_corrected_timestamp(&paths[2], aware("2020-06-01T12:20:00Z"))
        .unwrap();
    assert!(session.write_back().finish().is_empty());

    let written: Vec<_> = paths
        .iter()
        .map(|p| backend.value(p, TagId::ExifDateTimeOriginal).unwrap())
        .collect();
    assert_eq!(
        written,
        vec![
            "2020:06:01 10:00:00".to_string(),
            "2020:06:01 11:10:00".to_string(),
            "2020:06:01 12:20:00".to_string(),
        ]
    );
    let locked: Vec<bool> = session.files().iter().map(|f| f.locked).collect();
    assert_eq!(locked, vec![true, false, true]);
}

#[test]
fn test_progress_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _backend) = memory_session();
    session.add_files((0..4).map(|i| touch(dir.path(), &format!("{i}.jpg"))));

    let pass = session.reload();
    assert_eq!(pass.kind(), PassKind::Reload);
    assert_eq!(pass.file_count(), 4);
    assert_eq!(pass.len(), 6);

    let progress: Vec<f64> = pass.collect();
    assert_eq!(progress.len(), 6);
    assert_eq!(progress[0], 0.0);
    assert_eq!(*progress.last().unwrap(), 1.0);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_dropped_pass_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _backend) = memory_session();
    session.add_files((0..3).map(|i| touch(dir.path(), &format!("{i}.jpg"))));

    // Preparation plus the first file only.
    session.reload().take(2).for_each(drop);

    let resolved: Vec<bool> = session.files().iter().map(|f| f.timestamp.is_some()).collect();
    assert_eq!(resolved, vec![true, false, false]);
}
