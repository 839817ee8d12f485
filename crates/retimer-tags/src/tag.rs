//! The closed set of timestamp-bearing tags.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Metadata family a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Exif,
    Xmp,
    Iptc,
    QuickTime,
    Nikon,
    Avchd,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exif => "EXIF",
            Self::Xmp => "XMP",
            Self::Iptc => "IPTC",
            Self::QuickTime => "QuickTime",
            Self::Nikon => "Nikon",
            Self::Avchd => "AVCHD",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a tag's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `YYYY:MM:DD HH:MM:SS`, zone given by the EXIF offset tag.
    ExifDateTime,
    /// Whole hours east of UTC.
    OffsetHours,
    /// ISO-8601 with a UTC offset.
    XmpDateTime,
    /// Date half of an IPTC pair, in the local zone.
    IptcDate,
    /// Time half of an IPTC pair, in the local zone.
    IptcTime,
    /// `YYYY:MM:DD HH:MM:SS` in UTC.
    UtcDateTime,
    /// Free text, never rewritten.
    Text,
    /// AVCHD playlist record.
    Clip,
}

/// Resolution a tag stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    WholeSecond,
    SubSecond,
    /// Not a point in time.
    None,
}

/// Where a tag's UTC offset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Awareness {
    /// Sibling whole-hour offset tag.
    OffsetTag,
    /// Carried in the value.
    Aware,
    /// Local zone of the running environment.
    LocalZone,
    /// Always UTC.
    Utc,
    /// Timezone sidecar, naive when absent.
    Sidecar,
    /// Informational only.
    None,
}

impl ValueKind {
    pub fn precision(&self) -> Precision {
        match self {
            Self::XmpDateTime => Precision::SubSecond,
            Self::OffsetHours | Self::Text => Precision::None,
            _ => Precision::WholeSecond,
        }
    }

    pub fn awareness(&self) -> Awareness {
        match self {
            Self::ExifDateTime => Awareness::OffsetTag,
            Self::XmpDateTime => Awareness::Aware,
            Self::IptcDate | Self::IptcTime => Awareness::LocalZone,
            Self::UtcDateTime => Awareness::Utc,
            Self::Clip => Awareness::Sidecar,
            Self::OffsetHours | Self::Text => Awareness::None,
        }
    }
}

/// A supported tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
    ExifDateTime,
    ExifDateTimeOriginal,
    ExifDateTimeDigitized,
    ExifImageDateTimeOriginal,
    ExifPreviewDateTime,
    ExifTimeZoneOffset,
    XmpCreateDate,
    XmpPhotoshopDateCreated,
    IptcDateCreated,
    IptcTimeCreated,
    IptcDigitizationDate,
    IptcDigitizationTime,
    QuickTimeCreateDate,
    QuickTimeModifyDate,
    QuickTimeTrackCreateDate,
    QuickTimeTrackModifyDate,
    QuickTimeMediaCreateDate,
    QuickTimeMediaModifyDate,
    NikonTimeZone,
    NikonDaylightSavings,
    AvchdTimestamp,
}

struct TagSpec {
    key: &'static str,
    exiftool: &'static str,
    namespace: Namespace,
    kind: ValueKind,
}

const fn spec(
    key: &'static str,
    exiftool: &'static str,
    namespace: Namespace,
    kind: ValueKind,
) -> TagSpec {
    TagSpec {
        key,
        exiftool,
        namespace,
        kind,
    }
}

impl TagId {
    /// Every tag, in table order.
    pub const ALL: [TagId; 21] = [
        Self::ExifDateTime,
        Self::ExifDateTimeOriginal,
        Self::ExifDateTimeDigitized,
        Self::ExifImageDateTimeOriginal,
        Self::ExifPreviewDateTime,
        Self::ExifTimeZoneOffset,
        Self::XmpCreateDate,
        Self::XmpPhotoshopDateCreated,
        Self::IptcDateCreated,
        Self::IptcTimeCreated,
        Self::IptcDigitizationDate,
        Self::IptcDigitizationTime,
        Self::QuickTimeCreateDate,
        Self::QuickTimeModifyDate,
        Self::QuickTimeTrackCreateDate,
        Self::QuickTimeTrackModifyDate,
        Self::QuickTimeMediaCreateDate,
        Self::QuickTimeMediaModifyDate,
        Self::NikonTimeZone,
        Self::NikonDaylightSavings,
        Self::AvchdTimestamp,
    ];

    fn spec(&self) -> TagSpec {
        use Namespace::*;
        use ValueKind::*;
        match self {
            Self::ExifDateTime => spec("Exif.Image.DateTime", "IFD0:ModifyDate", Exif, ExifDateTime),
            Self::ExifDateTimeOriginal => spec(
                "Exif.Photo.DateTimeOriginal",
                "ExifIFD:DateTimeOriginal",
                Exif,
                ExifDateTime,
            ),
            Self::ExifDateTimeDigitized => spec(
                "Exif.Photo.DateTimeDigitized",
                "ExifIFD:CreateDate",
                Exif,
                ExifDateTime,
            ),
            Self::ExifImageDateTimeOriginal => spec(
                "Exif.Image.DateTimeOriginal",
                "IFD0:DateTimeOriginal",
                Exif,
                ExifDateTime,
            ),
            Self::ExifPreviewDateTime => spec(
                "Exif.Image.PreviewDateTime",
                "IFD0:PreviewDateTime",
                Exif,
                ExifDateTime,
            ),
            Self::ExifTimeZoneOffset => spec(
                "Exif.Image.TimeZoneOffset",
                "IFD0:TimeZoneOffset",
                Exif,
                OffsetHours,
            ),
            Self::XmpCreateDate => spec("Xmp.xmp.CreateDate", "XMP-xmp:CreateDate", Xmp, XmpDateTime),
            Self::XmpPhotoshopDateCreated => spec(
                "Xmp.photoshop.DateCreated",
                "XMP-photoshop:DateCreated",
                Xmp,
                XmpDateTime,
            ),
            Self::IptcDateCreated => spec(
                "Iptc.Application2.DateCreated",
                "IPTC:DateCreated",
                Iptc,
                IptcDate,
            ),
            Self::IptcTimeCreated => spec(
                "Iptc.Application2.TimeCreated",
                "IPTC:TimeCreated",
                Iptc,
                IptcTime,
            ),
            Self::IptcDigitizationDate => spec(
                "Iptc.Application2.DigitizationDate",
                "IPTC:DigitalCreationDate",
                Iptc,
                IptcDate,
            ),
            Self::IptcDigitizationTime => spec(
                "Iptc.Application2.DigitizationTime",
                "IPTC:DigitalCreationTime",
                Iptc,
                IptcTime,
            ),
            Self::QuickTimeCreateDate => spec(
                "QuickTime:CreateDate",
                "QuickTime:CreateDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::QuickTimeModifyDate => spec(
                "QuickTime:ModifyDate",
                "QuickTime:ModifyDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::QuickTimeTrackCreateDate => spec(
                "QuickTime:TrackCreateDate",
                "QuickTime:TrackCreateDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::QuickTimeTrackModifyDate => spec(
                "QuickTime:TrackModifyDate",
                "QuickTime:TrackModifyDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::QuickTimeMediaCreateDate => spec(
                "QuickTime:MediaCreateDate",
                "QuickTime:MediaCreateDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::QuickTimeMediaModifyDate => spec(
                "QuickTime:MediaModifyDate",
                "QuickTime:MediaModifyDate",
                QuickTime,
                UtcDateTime,
            ),
            Self::NikonTimeZone => spec("Nikon:TimeZone", "Nikon:TimeZone", Nikon, Text),
            Self::NikonDaylightSavings => {
                spec("Nikon:DaylightSavings", "Nikon:DaylightSavings", Nikon, Text)
            }
            Self::AvchdTimestamp => spec("AVCHD:Timestamp", "AVCHD:Timestamp", Avchd, Clip),
        }
    }

    /// Canonical identifier (`Exif.Photo.DateTimeOriginal`, `QuickTime:CreateDate`, ...).
    pub fn key(&self) -> &'static str {
        self.spec().key
    }

    /// Group-qualified exiftool tag name.
    pub fn exiftool_name(&self) -> &'static str {
        self.spec().exiftool
    }

    /// Exiftool tag name without its group, as printed by `exiftool -s`.
    pub fn short_name(&self) -> &'static str {
        let name = self.exiftool_name();
        name.split_once(':').map_or(name, |(_, short)| short)
    }

    pub fn namespace(&self) -> Namespace {
        self.spec().namespace
    }

    pub fn kind(&self) -> ValueKind {
        self.spec().kind
    }

    /// Whether the tag holds (part of) a point in time.
    pub fn is_timestamp(&self) -> bool {
        !matches!(self.kind(), ValueKind::OffsetHours | ValueKind::Text)
    }

    /// The time tag completing an IPTC date tag.
    pub fn time_partner(&self) -> Option<TagId> {
        match self {
            Self::IptcDateCreated => Some(Self::IptcTimeCreated),
            Self::IptcDigitizationDate => Some(Self::IptcDigitizationTime),
            _ => None,
        }
    }

    /// Tags held by an EXIF/XMP/IPTC metadata store.
    pub fn store_tags() -> impl Iterator<Item = TagId> {
        Self::ALL.into_iter().filter(|t| {
            matches!(
                t.namespace(),
                Namespace::Exif | Namespace::Xmp | Namespace::Iptc
            )
        })
    }

    /// Tags fetched through an external probe.
    pub fn probe_tags() -> impl Iterator<Item = TagId> {
        Self::ALL
            .into_iter()
            .filter(|t| matches!(t.namespace(), Namespace::QuickTime | Namespace::Nikon))
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.key() == s || t.exiftool_name() == s)
            .ok_or_else(|| Error::UnknownTag(s.to_string()))
    }
}
