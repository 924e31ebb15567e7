use serde::{Deserialize, Serialize};

/// Format of `MeterReading::date` (local time)
pub const READING_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One submission of water meter counters.
/// Appended to the user's list in meter_data.json, never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeterReading {
    pub apartment_number: i64,
    pub date: String,
    pub cold_water: i64,
    pub hot_water: i64,
}

/// Consumption since the previous reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingDelta {
    pub cold_water: i64,
    pub hot_water: i64,
}

impl MeterReading {
    pub fn new(apartment_number: i64, cold_water: i64, hot_water: i64) -> Self {
        Self {
            apartment_number,
            date: timestamp_now(),
            cold_water,
            hot_water,
        }
    }

    /// Meters only count up: both values must be >= the previous ones
    pub fn is_not_below(&self, previous: &MeterReading) -> bool {
        self.cold_water >= previous.cold_water && self.hot_water >= previous.hot_water
    }

    /// None when a difference does not fit in i64
    pub fn delta_from(&self, previous: &MeterReading) -> Option<ReadingDelta> {
        Some(ReadingDelta {
            cold_water: self.cold_water.checked_sub(previous.cold_water)?,
            hot_water: self.hot_water.checked_sub(previous.hot_water)?,
        })
    }
}

pub fn timestamp_now() -> String {
    chrono::Local::now().format(READING_DATE_FORMAT).to_string()
}

/// Parses "<cold> <hot>": exactly two whitespace-separated non-negative integers
pub fn parse_readings(input: &str) -> Option<(i64, i64)> {
    let mut parts = input.split_whitespace();
    let cold = parts.next()?.parse::<i64>().ok()?;
    let hot = parts.next()?.parse::<i64>().ok()?;

    if parts.next().is_some() || cold < 0 || hot < 0 {
        return None;
    }

    Some((cold, hot))
}
