use chrono::{offset::Utc, DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y%m%d";
const TIME_FORMAT: &str = "%H:%M";

/// One live measurement from the meter feed.
///
/// Field names follow the Tibber `liveMeasurement` object; any other telemetry
/// fields in the payload are ignored.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Instantaneous consumption in W; absent when the sensor skipped a sample
    pub power: Option<f64>,
    /// Energy consumed since midnight, in kWh
    pub accumulated_consumption: f64,
    /// Instantaneous export to the grid in W
    pub power_production: Option<f64>,
}

/// Summary of one closed window, as sent to PVOutput.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub consumption_wh: i64,
    pub power_w: i64,
    pub export_w: i64,
    pub credit_cents: Option<i64>,
    pub debit_cents: Option<i64>,
}

impl UploadRecord {
    /// Form fields for the `addstatus` service
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("d", self.date.format(DATE_FORMAT).to_string()),
            ("t", self.time.format(TIME_FORMAT).to_string()),
            ("v3", self.consumption_wh.to_string()),
            ("v4", self.power_w.to_string()),
        ];
        if let Some(credit) = self.credit_cents {
            fields.push(("v7", credit.to_string()));
        }
        if let Some(debit) = self.debit_cents {
            fields.push(("v8", debit.to_string()));
        }
        fields
    }
}

/// Rounds to the nearest whole unit, halves away from zero.
pub fn whole(value: f64) -> i64 {
    value.round() as i64
}

pub fn kwh_to_wh(kwh: f64) -> i64 {
    whole(kwh * 1000.0)
}
