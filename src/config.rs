use std::{num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use crate::error::SensorError;

const DEFAULT_PERIOD: NonZeroU64 = NonZeroU64::MIN.saturating_add(59);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Keep the process alive and wait on a timer.
    Timer,
    /// Arm the RTC wake alarm and suspend the whole board to RAM.
    Rtc,
}

impl FromStr for SleepMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timer" => Ok(SleepMode::Timer),
            "rtc" => Ok(SleepMode::Rtc),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" | "bunyan" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
}

impl MqttConfig {
    pub fn broker_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub period: NonZeroU64,
    pub interface: String,
    pub join_timeout: Duration,
    pub ntp_server: String,
    pub ntp_timeout: Duration,
    pub range_device: PathBuf,
    pub climate_device: PathBuf,
    pub timing_budget_us: u32,
    pub sleep_mode: SleepMode,
    pub rtc_device: String,
    pub run_once: bool,
    pub log: LogConfig,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, SensorError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SensorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = Settings(lookup);
        let host = setting
            .raw("MQTT_HOST")
            .ok_or(SensorError::MissingConfig("MQTT_HOST"))?;

        Ok(Self {
            mqtt: MqttConfig {
                host,
                port: setting.parse("MQTT_PORT", 1883)?,
                topic: setting.raw("MQTT_TOPIC").unwrap_or_else(|| "sensor/level".into()),
                client_id: setting
                    .raw("MQTT_CLIENT_ID")
                    .unwrap_or_else(|| "level-sensor".into()),
            },
            period: setting.parse("PERIOD_SECS", DEFAULT_PERIOD)?,
            interface: setting.raw("NET_INTERFACE").unwrap_or_else(|| "wlan0".into()),
            join_timeout: Duration::from_millis(setting.parse("JOIN_TIMEOUT_MS", 30_000)?),
            ntp_server: setting
                .raw("NTP_SERVER")
                .unwrap_or_else(|| "pool.ntp.org:123".into()),
            ntp_timeout: Duration::from_millis(setting.parse("NTP_TIMEOUT_MS", 3_000)?),
            range_device: setting
                .raw("RANGE_DEVICE")
                .unwrap_or_else(|| "/sys/bus/iio/devices/iio:device0".into())
                .into(),
            climate_device: setting
                .raw("CLIMATE_DEVICE")
                .unwrap_or_else(|| "/sys/bus/iio/devices/iio:device1".into())
                .into(),
            timing_budget_us: setting.parse("TIMING_BUDGET_US", 200_000)?,
            sleep_mode: setting.parse("SLEEP_MODE", SleepMode::Timer)?,
            rtc_device: setting.raw("RTC_DEVICE").unwrap_or_else(|| "rtc0".into()),
            run_once: setting.parse("RUN_ONCE", false)?,
            log: LogConfig {
                format: setting.parse("LOG_FORMAT", LogFormat::Text)?,
                dir: setting.raw("LOG_DIR").map(PathBuf::from),
            },
        })
    }
}

struct Settings<F>(F);

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, SensorError> {
        match self.raw(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| SensorError::InvalidConfig { key, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, SensorError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_fill_everything_but_the_broker() {
        let config = config_from(&[("MQTT_HOST", "10.0.0.2")]).unwrap();
        assert_eq!(config.mqtt.broker_address(), "10.0.0.2:1883");
        assert_eq!(config.mqtt.topic, "sensor/level");
        assert_eq!(config.period.get(), 60);
        assert_eq!(config.ntp_timeout, Duration::from_millis(3000));
        assert_eq!(config.timing_budget_us, 200_000);
        assert_eq!(config.sleep_mode, SleepMode::Timer);
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.log.dir.is_none());
        assert!(!config.run_once);
    }

    #[test]
    fn missing_broker_is_an_error() {
        assert!(matches!(
            config_from(&[]),
            Err(SensorError::MissingConfig("MQTT_HOST"))
        ));
        assert!(matches!(
            config_from(&[("MQTT_HOST", "  ")]),
            Err(SensorError::MissingConfig("MQTT_HOST"))
        ));
    }

    #[test]
    fn zero_period_is_rejected() {
        match config_from(&[("MQTT_HOST", "broker"), ("PERIOD_SECS", "0")]) {
            Err(SensorError::InvalidConfig { key, value }) => {
                assert_eq!(key, "PERIOD_SECS");
                assert_eq!(value, "0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("MQTT_HOST", "broker"),
            ("MQTT_PORT", "8883"),
            ("PERIOD_SECS", "900"),
            ("SLEEP_MODE", "RTC"),
            ("LOG_FORMAT", "json"),
            ("LOG_DIR", "/var/log/level-sensor"),
            ("RUN_ONCE", "true"),
        ])
        .unwrap();
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.period.get(), 900);
        assert_eq!(config.sleep_mode, SleepMode::Rtc);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/level-sensor")));
        assert!(config.run_once);
    }

    #[test]
    fn garbage_values_name_their_key() {
        let err = config_from(&[("MQTT_HOST", "broker"), ("SLEEP_MODE", "hibernate")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value \"hibernate\" for SLEEP_MODE");
    }
}
