//! Parsers for ZeTime reply payloads.
//!
//! All offsets are relative to the payload, after the 5-byte header.

use crate::data::{
    device_timestamp, BatteryInfo, DataSummary, HeartRateSample, SleepKind, SleepSample,
    StepSample, VersionInfo, VersionKind,
};
use crate::error::Result;
use crate::protocol::ByteReader;

/// Payload length of a heart rate reply carrying two measurements.
pub const DUAL_HEART_RATE_LEN: usize = 14;

/// Parse a battery reply.
pub fn parse_battery(payload: &[u8]) -> Result<BatteryInfo> {
    let level = ByteReader::new(payload).read_u8()?;
    Ok(BatteryInfo::from_level(level))
}

/// Parse a version reply: selector byte, then the NUL padded string.
pub fn parse_version(payload: &[u8]) -> Result<VersionInfo> {
    let mut reader = ByteReader::new(payload);
    let kind = VersionKind::from_selector(reader.read_u8()?);
    let text = String::from_utf8_lossy(reader.read_rest());
    Ok(VersionInfo {
        kind,
        version: text.trim_end_matches('\0').to_string(),
    })
}

/// Parse the availability summary.
pub fn parse_summary(payload: &[u8]) -> Result<DataSummary> {
    let mut reader = ByteReader::new(payload);
    let steps = reader.read_u16_le()?;
    let sleep = reader.read_u16_le()?;
    let heart_rate = reader.read_u16_le()?;
    Ok(DataSummary::new(steps, sleep, heart_rate))
}

/// Parse one step record.
pub fn parse_steps(payload: &[u8], offset_secs: i64) -> Result<StepSample> {
    let mut reader = ByteReader::new(payload);
    let index = reader.read_u16_le()?;
    let timestamp = device_timestamp(reader.read_u32_le()?, offset_secs)?;
    Ok(StepSample {
        index,
        timestamp,
        steps: reader.read_u32_le()?,
        calories: reader.read_u32_le()?,
        distance_meters: reader.read_u32_le()?,
        active_minutes: reader.read_u32_le()?,
    })
}

/// Parse one sleep record.
pub fn parse_sleep(payload: &[u8], offset_secs: i64) -> Result<SleepSample> {
    let mut reader = ByteReader::new(payload);
    let index = reader.read_u16_le()?;
    let timestamp = device_timestamp(reader.read_u32_le()?, offset_secs)?;
    let kind = SleepKind::from_raw(reader.read_u8()?);
    Ok(SleepSample {
        index,
        timestamp,
        kind,
    })
}

/// Parse a heart rate reply, which holds one or two measurements.
pub fn parse_heart_rate(payload: &[u8], offset_secs: i64) -> Result<Vec<HeartRateSample>> {
    let mut reader = ByteReader::new(payload);
    let mut samples = vec![read_heart_rate(&mut reader, offset_secs)?];
    if payload.len() == DUAL_HEART_RATE_LEN {
        samples.push(read_heart_rate(&mut reader, offset_secs)?);
    }
    Ok(samples)
}

fn read_heart_rate(reader: &mut ByteReader<'_>, offset_secs: i64) -> Result<HeartRateSample> {
    let index = reader.read_u16_le()?;
    let timestamp = device_timestamp(reader.read_u32_le()?, offset_secs)?;
    let bpm = reader.read_u8()?;
    Ok(HeartRateSample {
        index,
        timestamp,
        bpm,
    })
}
