use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveTime};
use env_logger::Env;

use pvlive::{
    argsets,
    command,
    constants::{defaults, envvars},
    helpers,
};

const CMD_LIVE: &str = "live";
const CMD_ADD_STATUS: &str = "add-status";

fn main() -> Result<()> {
    helpers::load_dotenv();
    env_logger::Builder::from_env(Env::default().filter_or(envvars::LOG_LEVEL, defaults::LOG_LEVEL))
        .init();

    let mut args = pico_args::Arguments::from_env();
    match args.subcommand()?.as_deref() {
        Some(CMD_LIVE) => command::live(),
        Some(CMD_ADD_STATUS) => command::add_status(argsets::AddStatusArgs {
            date: args.value_from_fn("--date", |s| NaiveDate::parse_from_str(s, "%Y%m%d"))?,
            time: args.value_from_fn("--time", |s| NaiveTime::parse_from_str(s, "%H:%M"))?,
            consumption_wh: args.value_from_str("--consumption")?,
            power_w: args.value_from_str("--power")?,
            credit_cents: args.opt_value_from_str("--credit")?,
            debit_cents: args.opt_value_from_str("--debit")?,
        }),
        _ => Err(anyhow!("Subcommand must be one of 'live', 'add-status'")),
    }
}
