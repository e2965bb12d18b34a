use std::time::Duration;

pub const LOG_LEVEL: &str = "INFO";

pub const PVOUTPUT_BASE_URL: &str = "https://pvoutput.org";
pub const PVOUTPUT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const MQTT_HOST: &str = "localhost";
pub const MQTT_PORT: u16 = 1883;
pub const MQTT_CLIENT_PREFIX: &str = "pvlive";
pub const MQTT_RECONNECT_MAX_INTERVAL: Duration = Duration::from_secs(60);

pub const LOCAL_TIMEZONE: &str = "Europe/Amsterdam";

pub const WINDOW_MINUTES: u32 = 5;
// Solar inverter reports land on hh:01, hh:06, ...; matching that merges both into one status row.
pub const WINDOW_PHASE_OFFSET_MINUTES: u32 = 1;
