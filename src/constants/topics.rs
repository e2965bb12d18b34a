pub const LIVE_MEASUREMENT: &str = "tibber/live";
