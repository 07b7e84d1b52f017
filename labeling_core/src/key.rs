use std::fmt::Display;

/// Separator used by the textual form of a record key.
pub const KEY_SEPARATOR: char = '|';

/// The identity of a record.
///
/// The identity is the triple of fields, not a concatenated string, so a field
/// containing the separator does not collide with another record.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub day: String,
    pub station: String,
    pub satellite: String,
}

impl RecordKey {
    pub fn new(day: &str, station: &str, satellite: &str) -> RecordKey {
        RecordKey {
            day: day.to_string(),
            station: station.to_string(),
            satellite: satellite.to_string(),
        }
    }

    /// The `day|station|satellite` form used by older label exports.
    pub fn legacy_string(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.day, KEY_SEPARATOR, self.station, KEY_SEPARATOR, self.satellite
        )
    }

    /// Reads back a key in the `day|station|satellite` form.
    ///
    /// The satellite absorbs any extra separator.
    pub fn from_legacy(s: &str) -> Option<RecordKey> {
        let mut parts = s.splitn(3, KEY_SEPARATOR);
        let day = parts.next()?;
        let station = parts.next()?;
        let satellite = parts.next()?;
        Some(RecordKey::new(day, station, satellite))
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Day: {} | Station: {} | Satellite: {}",
            self.day, self.station, self.satellite
        )
    }
}

/// Some label exports only carry the time of day (`HH:MM:SS`) in the day
/// field. Prefixes those with the date of the campaign so that they match the
/// records.
pub fn normalize_day(raw: &str, launch_date: Option<&str>) -> String {
    let day = raw.trim();
    match launch_date {
        Some(date) if is_time_of_day(day) => format!("{} {}", date, day),
        _ => day.to_string(),
    }
}

fn is_time_of_day(s: &str) -> bool {
    s.len() == 8 && s.split(':').count() == 3
}
