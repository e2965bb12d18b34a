use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::data_mgmt::{aggregator::Aggregator, publish::run_live_uploads};
use crate::interfaces::pvoutput::PvOutputClient;
use crate::readers::live_feed;

/// Average the live feed into windows and upload each one to PVOutput
pub fn live() -> Result<()> {
    let config = Config::from_env()?;
    let sink = Arc::new(PvOutputClient::new(&config.pvoutput)?);

    let (readings_tx, readings_rx) = flume::unbounded();
    let feed = live_feed::subscribe(&config.feed, move |reading| {
        match readings_tx.send(reading) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => {
                log::warn!("Upload loop has stopped; dropping reading");
                ControlFlow::Break(())
            }
        }
    });

    log::info!(
        "Averaging live readings over {} minute windows",
        config.windowing.width().num_minutes()
    );
    // Runs until the feed thread ends and drops its sender
    run_live_uploads(readings_rx, Aggregator::new(config.windowing), sink);

    feed.join()?;
    Ok(())
}
