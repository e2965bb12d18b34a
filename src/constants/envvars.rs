pub const LOG_LEVEL: &str = "LOGGING_LEVEL";

pub const PVOUTPUT_API_KEY: &str = "PVOUTPUT_API_KEY";
pub const PVOUTPUT_SYSTEM_ID: &str = "PVOUTPUT_SYSTEM_ID";
pub const PVOUTPUT_BASE_URL: &str = "PVOUTPUT_BASE_URL";
pub const PVOUTPUT_REQUEST_TIMEOUT_SECS: &str = "PVOUTPUT_REQUEST_TIMEOUT_SECS";

pub const MQTT_HOST: &str = "MQTT_HOST";
pub const MQTT_PORT: &str = "MQTT_PORT";
pub const MQTT_TOPIC: &str = "MQTT_TOPIC";

pub const LOCAL_TIMEZONE: &str = "LOCAL_TIMEZONE";

pub const WINDOW_MINUTES: &str = "WINDOW_MINUTES";
pub const WINDOW_PHASE_OFFSET_MINUTES: &str = "WINDOW_PHASE_OFFSET_MINUTES";

pub const DOTENV_PATH: &str = "PVLIVE_DOTENV";
