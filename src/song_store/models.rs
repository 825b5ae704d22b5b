use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A play/like counter as last reported by the extractor.
///
/// `Unknown` records that the most recent fetch failed, which is different
/// from a confirmed count of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricValue {
    Known(u64),
    Unknown,
}

impl MetricValue {
    pub const UNKNOWN_MARKER: &'static str = "unknown";

    /// Maps a nullable SQLite INTEGER column, where NULL stores `Unknown`.
    pub fn from_column(value: Option<i64>) -> Self {
        match value {
            Some(n) if n >= 0 => MetricValue::Known(n as u64),
            _ => MetricValue::Unknown,
        }
    }

    pub fn to_column(self) -> Option<i64> {
        match self {
            MetricValue::Known(n) => Some(n.min(i64::MAX as u64) as i64),
            MetricValue::Unknown => None,
        }
    }

    pub fn known(self) -> Option<u64> {
        match self {
            MetricValue::Known(n) => Some(n),
            MetricValue::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, MetricValue::Unknown)
    }
}

impl Default for MetricValue {
    fn default() -> Self {
        MetricValue::Known(0)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Known(n) => write!(f, "{}", n),
            MetricValue::Unknown => f.write_str(Self::UNKNOWN_MARKER),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Known(n) => serializer.serialize_u64(*n),
            MetricValue::Unknown => serializer.serialize_str(Self::UNKNOWN_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(MetricValue::Known(n)),
            Raw::Text(s) if s == Self::UNKNOWN_MARKER => Ok(MetricValue::Unknown),
            Raw::Text(s) => s.parse().map(MetricValue::Known).map_err(|_| {
                serde::de::Error::custom(format!("invalid metric value '{}'", s))
            }),
        }
    }
}

/// The pair of counters tracked for every song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SongMetrics {
    pub views: MetricValue,
    pub likes: MetricValue,
}

impl SongMetrics {
    pub fn new(views: MetricValue, likes: MetricValue) -> Self {
        Self { views, likes }
    }

    /// The sentinel written when a fetch fails.
    pub fn unknown() -> Self {
        Self {
            views: MetricValue::Unknown,
            likes: MetricValue::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.views.is_unknown() && self.likes.is_unknown()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i64,
    pub playlist_id: Option<i64>,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    /// Identifier of the media item on the upstream service, unique per song.
    pub media_id: String,
    pub views: MetricValue,
    pub likes: MetricValue,
    pub updated_at: DateTime<Utc>,
}

impl Song {
    pub fn metrics(&self) -> SongMetrics {
        SongMetrics::new(self.views, self.likes)
    }
}

/// Fields supplied when a song is added; counters start at zero.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub playlist_id: Option<i64>,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    pub media_id: String,
}
