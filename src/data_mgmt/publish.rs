use std::error::Error;
use std::sync::Arc;
use std::thread;

use flume::{Receiver, RecvError, Selector, Sender};

use super::aggregator::{Aggregator, Emission};
use super::models::{Reading, UploadRecord};

/// Destination for window summaries
pub trait StatusSink: Send + Sync + 'static {
    type Error: Error + Send + 'static;

    fn add_status(&self, record: &UploadRecord) -> Result<(), Self::Error>;
}

enum Event<E> {
    Reading(Reading),
    Uploaded(Result<(), E>),
    FeedClosed,
}

/// Feeds readings into the aggregator and uploads each closed window.
///
/// Uploads run on their own thread so readings keep accumulating meanwhile;
/// their outcome comes back over a channel and is applied on this thread,
/// which is the only one touching the aggregator. Returns once the reading
/// channel is closed and any in-flight upload has finished.
pub fn run_live_uploads<S: StatusSink>(
    readings: Receiver<Reading>,
    mut aggregator: Aggregator,
    sink: Arc<S>,
) -> Aggregator {
    let (done_tx, done_rx) = flume::unbounded();

    loop {
        let event = Selector::new()
            .recv(&readings, |r| r.map_or(Event::FeedClosed, Event::Reading))
            .recv(&done_rx, |r: Result<_, RecvError>| {
                r.map_or(Event::FeedClosed, Event::Uploaded)
            })
            .wait();

        match event {
            Event::Reading(reading) => {
                log::trace!("Reading: {:?}", reading);
                if let Some(emission) = aggregator.on_reading(&reading) {
                    spawn_upload(&sink, emission, &done_tx);
                }
            }
            Event::Uploaded(result) => aggregator.finish_upload(result),
            Event::FeedClosed => break,
        }
    }

    if aggregator.is_in_flight() {
        log::info!("Reading feed closed; waiting for upload in flight");
        if let Ok(result) = done_rx.recv() {
            aggregator.finish_upload(result);
        }
    }
    if let Some(pending) = aggregator.pending_upload() {
        log::warn!(
            "Reading feed closed; dropping window {} ({} samples) that was not uploaded",
            pending.bucket,
            pending.sample_count
        );
    }
    aggregator
}

fn spawn_upload<S: StatusSink>(
    sink: &Arc<S>,
    emission: Emission,
    done: &Sender<Result<(), S::Error>>,
) {
    let sink = Arc::clone(sink);
    let done = done.clone();
    log::debug!(
        "Uploading window {} ({} samples): {:?}",
        emission.bucket,
        emission.sample_count,
        emission.record
    );
    thread::spawn(move || {
        let result = sink.add_status(&emission.record);
        // Only fails once the loop has returned, when nobody needs the outcome
        done.send(result).ok();
    });
}
