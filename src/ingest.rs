// JSON-lines input records for the command-line tool

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::IngestError;
use crate::point::Point;

/// Lane used when a record names none
pub const DEFAULT_LANE: &str = "default";

fn default_lane() -> String {
    DEFAULT_LANE.to_string()
}

/// Timestamp as either RFC 3339 text or fractional Unix seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecordTime {
    Epoch(f64),
    Text(DateTime<Utc>),
}

impl RecordTime {
    fn to_utc(&self) -> Result<DateTime<Utc>, IngestError> {
        match self {
            RecordTime::Text(t) => Ok(*t),
            RecordTime::Epoch(secs) => {
                if !secs.is_finite() {
                    return Err(IngestError::BadTimestamp(*secs));
                }
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
                DateTime::from_timestamp(whole as i64, nanos)
                    .ok_or(IngestError::BadTimestamp(*secs))
            }
        }
    }
}

/// One position report as read from input
#[derive(Debug, Clone, Deserialize)]
pub struct PointRecord {
    #[serde(default = "default_lane", alias = "facility")]
    pub lane: String,
    time: RecordTime,
    pub key: String,
    /// Missing coordinates give a point without usable geometry
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default, alias = "altitude")]
    pub alt: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub course: Option<f64>,
}

impl PointRecord {
    pub fn into_point(self) -> Result<(String, Point), IngestError> {
        let time = self.time.to_utc()?;
        let mut point = Point::new(
            self.key,
            time,
            self.lat.unwrap_or(f64::NAN),
            self.lon.unwrap_or(f64::NAN),
        );
        point.altitude_ft = self.alt;
        point.speed_kts = self.speed;
        point.course_deg = self.course;
        Ok((self.lane, point))
    }
}

/// Parse one input line into its lane name and point.
///
/// Blank lines and lines starting with `#` yield `None`.
pub fn parse_line(line: &str) -> Result<Option<(String, Point)>, IngestError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let record: PointRecord = serde_json::from_str(line)?;
    record.into_point().map(Some)
}
