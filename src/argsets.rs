use chrono::{NaiveDate, NaiveTime};

pub struct AddStatusArgs {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub consumption_wh: i64,
    pub power_w: i64,
    pub credit_cents: Option<i64>,
    pub debit_cents: Option<i64>,
}
