use anyhow::Result;

use crate::argsets::AddStatusArgs;
use crate::config::PvOutputSettings;
use crate::data_mgmt::models::UploadRecord;
use crate::interfaces::pvoutput::PvOutputClient;

/// Post a single status, e.g. to check credentials
pub fn add_status(args: AddStatusArgs) -> Result<()> {
    let client = PvOutputClient::new(&PvOutputSettings::from_env()?)?;
    let record = UploadRecord {
        date: args.date,
        time: args.time,
        consumption_wh: args.consumption_wh,
        power_w: args.power_w,
        export_w: 0,
        credit_cents: args.credit_cents,
        debit_cents: args.debit_cents,
    };

    client.add_status(&record)?;
    log::info!(
        "Data uploaded successfully for {} at {}",
        record.date.format("%Y%m%d"),
        record.time.format("%H:%M")
    );
    Ok(())
}
