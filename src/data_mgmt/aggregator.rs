//! Windowed averaging of live readings
//!
//! Readings are grouped into fixed-width windows. When a reading lands in a new
//! window, the previous one is closed into an [`UploadRecord`] and handed out as
//! an [`Emission`], provided no other upload is still in flight. A window whose
//! upload fails is kept, samples intact, and handed out again on the next reading.
//!
//! Readings may arrive out of order. One that belongs to a window older than
//! the open one is discarded, so a closed window is never reopened.

use std::fmt::Display;

use std::cmp::Ordering;

use chrono::{offset::Utc, DateTime, NaiveDateTime};

use super::models::{kwh_to_wh, whole, Reading, UploadRecord};
use super::windowing::{Bucket, Windowing};

#[derive(Debug)]
struct Window {
    bucket: Bucket,
    label: NaiveDateTime,
    starts_at: DateTime<Utc>,
    samples: Vec<f64>,
    accumulated_consumption: f64,
    power_production: Option<f64>,
}

impl Window {
    fn open(bucket: Bucket, label: NaiveDateTime, starts_at: DateTime<Utc>) -> Self {
        Window {
            bucket,
            label,
            starts_at,
            samples: Vec::new(),
            accumulated_consumption: 0.0,
            power_production: None,
        }
    }

    fn add(&mut self, reading: &Reading) {
        if let Some(power) = reading.power {
            self.samples.push(power);
        }
        self.accumulated_consumption = reading.accumulated_consumption;
        self.power_production = reading.power_production;
    }

    fn mean_power(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    fn close(self, fallback_power: Option<f64>) -> ClosedWindow {
        let power = self.mean_power().or(fallback_power).unwrap_or(0.0);
        let record = UploadRecord {
            date: self.label.date(),
            time: self.label.time(),
            consumption_wh: kwh_to_wh(self.accumulated_consumption),
            power_w: whole(power),
            export_w: whole(self.power_production.unwrap_or(0.0)),
            credit_cents: None,
            debit_cents: None,
        };
        ClosedWindow {
            window: self,
            record,
        }
    }
}

#[derive(Debug)]
struct ClosedWindow {
    window: Window,
    record: UploadRecord,
}

impl ClosedWindow {
    fn emission(&self) -> Emission {
        Emission {
            bucket: self.window.bucket,
            record: self.record.clone(),
            sample_count: self.window.samples.len(),
        }
    }
}

/// A closed window that is ready to be uploaded
#[derive(Clone, Debug, PartialEq)]
pub struct Emission {
    pub bucket: Bucket,
    pub record: UploadRecord,
    pub sample_count: usize,
}

#[derive(Debug)]
pub struct Aggregator {
    windowing: Windowing,
    open: Option<Window>,
    ready: Option<ClosedWindow>,
    in_flight: Option<ClosedWindow>,
    last_emitted: Option<Bucket>,
    last_power: Option<f64>,
}

impl Aggregator {
    pub fn new(windowing: Windowing) -> Self {
        Aggregator {
            windowing,
            open: None,
            ready: None,
            in_flight: None,
            last_emitted: None,
            last_power: None,
        }
    }

    /// Accounts for one reading.
    ///
    /// Returns the window to upload next, if one is ready and nothing is in flight.
    /// The caller must report the outcome through [`Aggregator::finish_upload`].
    pub fn on_reading(&mut self, reading: &Reading) -> Option<Emission> {
        let bucket = self.windowing.bucket_of(reading.timestamp);
        let starts_at = self.windowing.window_start(reading.timestamp);

        // Start instants rather than minute buckets, so a gap of whole hours
        // still rolls the window over
        match self.open.as_ref().map(|w| starts_at.cmp(&w.starts_at)) {
            Some(Ordering::Less) => {
                log::debug!(
                    "Discarding late reading from {} for closed window {}",
                    reading.timestamp,
                    bucket
                );
                return self.start_emission();
            }
            Some(Ordering::Greater) => {
                if let Some(window) = self.open.take() {
                    self.close(window);
                }
            }
            Some(Ordering::Equal) | None => (),
        }

        let label = self.windowing.label_of(reading.timestamp);
        self.open
            .get_or_insert_with(|| Window::open(bucket, label, starts_at))
            .add(reading);
        if reading.power.is_some() {
            self.last_power = reading.power;
        }

        self.start_emission()
    }

    /// Releases the in-flight upload.
    ///
    /// On failure the window becomes eligible again, unless a newer window has
    /// closed in the meantime, in which case the failed one is dropped.
    pub fn finish_upload<E: Display>(&mut self, result: Result<(), E>) {
        let Some(closed) = self.in_flight.take() else {
            log::warn!("Upload finished while none was in flight");
            return;
        };
        let record = &closed.record;

        match result {
            Ok(()) => {
                log::info!(
                    "Data uploaded successfully for {} at {}",
                    record.date.format("%Y%m%d"),
                    record.time.format("%H:%M")
                );
                log::info!(
                    "Average ({} readings) power: {} W; exported: {} W; consumption: {} Wh",
                    closed.window.samples.len(),
                    record.power_w,
                    record.export_w,
                    record.consumption_wh
                );
                self.last_emitted = Some(closed.window.bucket);
            }
            Err(e) => {
                log::error!(
                    "Error uploading window {} to PVOutput: {}",
                    closed.window.bucket,
                    e
                );
                if self.ready.is_none() {
                    self.ready = Some(closed);
                } else {
                    log::warn!(
                        "Dropping window {} ({} samples); a newer window is waiting",
                        closed.window.bucket,
                        closed.window.samples.len()
                    );
                }
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_emitted(&self) -> Option<Bucket> {
        self.last_emitted
    }

    /// Power samples of the window currently being filled
    pub fn open_samples(&self) -> &[f64] {
        self.open.as_ref().map_or(&[][..], |w| w.samples.as_slice())
    }

    /// Power samples of the closed window awaiting (re)upload
    pub fn retained_samples(&self) -> Option<&[f64]> {
        self.ready.as_ref().map(|c| c.window.samples.as_slice())
    }

    /// The closed window still waiting for a (re)upload, if any
    pub fn pending_upload(&self) -> Option<Emission> {
        self.ready.as_ref().map(ClosedWindow::emission)
    }

    fn close(&mut self, window: Window) {
        let closed = window.close(self.last_power);
        log::debug!(
            "Closed window {} with {} samples",
            closed.window.bucket,
            closed.window.samples.len()
        );
        if let Some(dropped) = self.ready.replace(closed) {
            log::warn!(
                "Dropping window {} ({} samples); it was not uploaded before the next window closed",
                dropped.window.bucket,
                dropped.window.samples.len()
            );
        }
    }

    fn start_emission(&mut self) -> Option<Emission> {
        if self.in_flight.is_some() {
            return None;
        }
        let closed = self.ready.take()?;
        let emission = closed.emission();
        self.in_flight = Some(closed);
        Some(emission)
    }
}
