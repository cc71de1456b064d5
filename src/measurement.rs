use core::fmt::Write;

use crate::error::SensorError;

pub const DEVICE_ID_LEN: usize = 6;

/// Short hardware-derived identifier of this unit, e.g. `ABC123`.
pub type DeviceId = heapless::String<DEVICE_ID_LEN>;

/// The record threaded through one wake cycle.
///
/// Every field is written by exactly one step, in step order. A step may
/// only read fields produced by the steps before it; nothing checks this at
/// runtime. Readings that have not been taken yet are `None` so that a real
/// zero reading can be told apart from a step that never ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Measurement {
    pub device_id: DeviceId,
    /// Seconds since the Unix epoch, 0 until the time sync succeeds.
    pub epoch_time: u64,
    pub humidity: Option<i32>,
    pub temperature: Option<i32>,
    pub range_mm: Option<u32>,
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        Reading::try_from(self).is_ok()
    }
}

/// Wire form of a fully populated [`Measurement`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reading {
    pub id: String,
    pub time: u64,
    pub humidity: i32,
    pub temperature: i32,
    pub range: u32,
}

impl Reading {
    pub fn to_json(&self) -> Result<Vec<u8>, SensorError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, SensorError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl TryFrom<&Measurement> for Reading {
    type Error = SensorError;

    fn try_from(m: &Measurement) -> Result<Self, Self::Error> {
        if m.device_id.is_empty() {
            return Err(SensorError::Incomplete("device_id"));
        }
        if m.epoch_time == 0 {
            return Err(SensorError::Incomplete("epoch_time"));
        }
        Ok(Self {
            id: m.device_id.as_str().to_owned(),
            time: m.epoch_time,
            humidity: m.humidity.ok_or(SensorError::Incomplete("humidity"))?,
            temperature: m.temperature.ok_or(SensorError::Incomplete("temperature"))?,
            range: m.range_mm.ok_or(SensorError::Incomplete("range_mm"))?,
        })
    }
}

impl TryFrom<&Reading> for Measurement {
    type Error = SensorError;

    fn try_from(r: &Reading) -> Result<Self, Self::Error> {
        Ok(Self {
            device_id: device_id(&r.id)?,
            epoch_time: r.time,
            humidity: Some(r.humidity),
            temperature: Some(r.temperature),
            range_mm: Some(r.range),
        })
    }
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let at = i64::try_from(self.time)
            .ok()
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0));
        write!(f, "{}[", self.id)?;
        match at {
            Some(at) => write!(f, "{}", at.to_rfc3339())?,
            None => write!(f, "{}", self.time)?,
        }
        write!(
            f,
            "] - range: {}mm, temperature: {}, humidity: {}",
            self.range, self.temperature, self.humidity
        )
    }
}

/// Copies `id` into a [`DeviceId`], rejecting identifiers that do not fit.
pub fn device_id(id: &str) -> Result<DeviceId, SensorError> {
    let mut out = DeviceId::new();
    out.write_str(id).map_err(|_| {
        SensorError::Protocol(format!("device id {id:?} longer than {DEVICE_ID_LEN}"))
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: &str =
        r#"{"id":"ABC123","time":1700000000,"humidity":45,"temperature":21,"range":312}"#;

    fn populated() -> Measurement {
        Measurement {
            device_id: device_id("ABC123").unwrap(),
            epoch_time: 1_700_000_000,
            humidity: Some(45),
            temperature: Some(21),
            range_mm: Some(312),
        }
    }

    #[test]
    fn starts_zeroed_and_unset() {
        let m = Measurement::new();
        assert!(m.device_id.is_empty());
        assert_eq!(m.epoch_time, 0);
        assert_eq!(m.humidity, None);
        assert_eq!(m.temperature, None);
        assert_eq!(m.range_mm, None);
        assert!(!m.is_complete());
    }

    #[test]
    fn serializes_to_flat_json_object() {
        let reading = Reading::try_from(&populated()).unwrap();
        let json = reading.to_json().unwrap();
        assert_eq!(std::str::from_utf8(&json).unwrap(), WIRE);
    }

    #[test]
    fn parses_back_into_the_same_fields() {
        let reading = Reading::from_json(WIRE.as_bytes()).unwrap();
        let m = Measurement::try_from(&reading).unwrap();
        assert_eq!(m, populated());
    }

    #[test]
    fn zero_readings_are_valid_once_measured() {
        let mut m = populated();
        m.temperature = Some(0);
        m.humidity = Some(0);
        m.range_mm = Some(0);
        let reading = Reading::try_from(&m).unwrap();
        assert_eq!(reading.temperature, 0);
        assert_eq!(reading.range, 0);
    }

    #[test]
    fn incomplete_record_names_the_missing_field() {
        let mut m = populated();
        m.humidity = None;
        match Reading::try_from(&m) {
            Err(SensorError::Incomplete(field)) => assert_eq!(field, "humidity"),
            other => panic!("unexpected {other:?}"),
        }

        let mut m = populated();
        m.epoch_time = 0;
        assert!(matches!(
            Reading::try_from(&m),
            Err(SensorError::Incomplete("epoch_time"))
        ));
    }

    #[test]
    fn rejects_oversized_device_id() {
        assert!(device_id("ABCDEFG").is_err());
        assert_eq!(device_id("ABC123").unwrap().as_str(), "ABC123");
    }

    #[test]
    fn display_includes_rfc3339_time() {
        let reading = Reading::try_from(&populated()).unwrap();
        let line = reading.to_string();
        assert!(line.starts_with("ABC123[2023-11-14T22:13:20+00:00]"));
        assert!(line.ends_with("range: 312mm, temperature: 21, humidity: 45"));
    }
}
