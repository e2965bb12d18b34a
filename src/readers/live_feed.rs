//! Live meter feed delivered over MQTT
//!
//! A meter bridge publishes each live measurement as JSON, either as a bare
//! `liveMeasurement` object or wrapped the way the GraphQL subscription sends
//! it (`{"data": {"liveMeasurement": {...}}}`, possibly inside `"payload"`).

use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};

use rumqttc::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::FeedSettings;
use crate::constants::defaults;
use crate::data_mgmt::models::Reading;
use crate::interfaces::mqtt::{self, MqttError};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error(transparent)]
    Mqtt(#[from] MqttError),
    #[error("feed thread panicked")]
    Panicked,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("could not parse live measurement JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LiveMessage {
    Bare(Reading),
    Data { data: LiveData },
    Payload { payload: Box<LiveMessage> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveData {
    live_measurement: Reading,
}

impl LiveMessage {
    fn into_reading(self) -> Reading {
        match self {
            LiveMessage::Bare(reading) => reading,
            LiveMessage::Data { data } => data.live_measurement,
            LiveMessage::Payload { payload } => payload.into_reading(),
        }
    }
}

pub fn parse_reading(payload: &str) -> Result<Reading, PayloadError> {
    Ok(serde_json::from_str::<LiveMessage>(payload)?.into_reading())
}

/// Handle on a running feed subscription
pub struct FeedHandle {
    client: Client,
    thread: JoinHandle<Result<(), MqttError>>,
}

impl FeedHandle {
    /// Blocks until the feed thread ends
    pub fn join(self) -> Result<(), FeedError> {
        Ok(self.thread.join().map_err(|_| FeedError::Panicked)??)
    }

    /// Disconnects from the broker and waits for the feed thread to end
    pub fn disconnect(self) -> Result<(), FeedError> {
        self.client.disconnect().map_err(MqttError::from)?;
        self.join()
    }
}

/// Subscribes to the live feed; `on_reading` runs on the feed thread for every
/// well-formed measurement. Malformed payloads are logged and skipped.
///
/// Returning [`ControlFlow::Break`] from `on_reading` disconnects the feed.
pub fn subscribe<F>(settings: &FeedSettings, mut on_reading: F) -> FeedHandle
where
    F: FnMut(Reading) -> ControlFlow<()> + Send + 'static,
{
    let client_id = mqtt::get_rand_client_id(Some(defaults::MQTT_CLIENT_PREFIX));
    let (client, connection) = mqtt::client_conn(&settings.host, settings.port, client_id);
    let feed_client = client.clone();
    let topic = settings.topic.clone();

    let thread = thread::spawn(move || {
        let control = feed_client.clone();
        let mut stopped = false;
        mqtt::sub_topic(feed_client, connection, &topic, |msg| {
            if stopped {
                return;
            }
            match parse_reading(&msg.payload) {
                Ok(reading) => {
                    if on_reading(reading).is_break() {
                        log::info!("Reading consumer stopped; disconnecting feed");
                        stopped = true;
                        if let Err(e) = control.disconnect() {
                            log::error!("Could not disconnect feed: {}", e);
                        }
                    }
                }
                Err(e) => log::warn!("Skipping message on {}: {}", msg.topic, e),
            }
        })
    });

    FeedHandle { client, thread }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    const TOPIC: &str = "tibber/live";
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    fn publish_packet(topic: &str, payload: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(payload.as_bytes());

        let mut packet = vec![0x30];
        let mut remaining = body.len();
        loop {
            let mut byte = (remaining % 128) as u8;
            remaining /= 128;
            if remaining > 0 {
                byte |= 0x80;
            }
            packet.push(byte);
            if remaining == 0 {
                break;
            }
        }
        packet.extend(body);
        packet
    }

    /// Accepts one client, acknowledges its CONNECT, sends `payloads` on the
    /// live topic and then holds the connection until the client hangs up.
    fn fake_broker(payloads: Vec<&'static str>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            stream.read(&mut buf).unwrap();
            stream.write_all(&CONNACK).unwrap();
            for payload in payloads {
                stream.write_all(&publish_packet(TOPIC, payload)).unwrap();
            }
            while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
        });
        port
    }

    fn settings(port: u16) -> FeedSettings {
        FeedSettings {
            host: "127.0.0.1".to_string(),
            port,
            topic: TOPIC.to_string(),
        }
    }

    fn join_within(handle: FeedHandle, timeout: Duration) -> Result<(), FeedError> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || tx.send(handle.join()).ok());
        rx.recv_timeout(timeout).unwrap()
    }

    #[test]
    fn delivers_readings_until_disconnected() {
        let port = fake_broker(vec!["not json", BARE]);
        let (tx, rx) = mpsc::channel();
        let handle = subscribe(&settings(port), move |reading| {
            tx.send(reading).ok();
            ControlFlow::Continue(())
        });

        let reading = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reading.power, Some(431.0));

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || done_tx.send(handle.disconnect()).ok());
        assert!(done_rx.recv_timeout(Duration::from_secs(10)).unwrap().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stops_when_consumer_breaks() {
        let port = fake_broker(vec![BARE, GRAPHQL_NEXT]);
        let (tx, rx) = mpsc::channel();
        let handle = subscribe(&settings(port), move |reading| {
            tx.send(reading).ok();
            ControlFlow::Break(())
        });

        assert!(join_within(handle, Duration::from_secs(10)).is_ok());
        assert_eq!(rx.try_iter().count(), 1);
    }

    const BARE: &str = r#"
    {
        "timestamp": "2024-07-26T12:06:31.000+02:00",
        "power": 431,
        "accumulatedConsumption": 4.1234,
        "accumulatedProduction": 1.5,
        "powerProduction": 0,
        "voltagePhase1": 231.2,
        "signalStrength": -71,
        "currency": "EUR"
    }
    "#;

    const GRAPHQL_NEXT: &str = r#"
    {
        "id": "1",
        "type": "next",
        "payload": {
            "data": {
                "liveMeasurement": {
                    "timestamp": "2024-07-26T12:06:33.000+02:00",
                    "power": null,
                    "accumulatedConsumption": 4.1301,
                    "powerProduction": 812
                }
            }
        }
    }
    "#;

    #[test]
    fn parses_bare_measurement() {
        let reading = parse_reading(BARE).unwrap();
        assert_eq!(reading.power, Some(431.0));
        assert_eq!(reading.accumulated_consumption, 4.1234);
        assert_eq!(reading.power_production, Some(0.0));
        assert_eq!(
            reading.timestamp,
            "2024-07-26T10:06:31Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
        );
    }

    #[test]
    fn parses_graphql_envelope() {
        let reading = parse_reading(GRAPHQL_NEXT).unwrap();
        assert_eq!(reading.power, None);
        assert_eq!(reading.power_production, Some(812.0));
    }

    #[test]
    fn parses_data_envelope() {
        let reading = parse_reading(
            r#"{"data": {"liveMeasurement": {"timestamp": "2024-07-26T12:06:33Z", "power": 12.5, "accumulatedConsumption": 3.2}}}"#,
        )
        .unwrap();
        assert_eq!(reading.power, Some(12.5));
        assert_eq!(reading.accumulated_consumption, 3.2);
    }

    #[test]
    fn rejects_measurement_without_consumption() {
        assert!(parse_reading(r#"{"timestamp": "2024-07-26T12:06:33Z", "power": 12.5}"#).is_err());
        assert!(parse_reading(
            r#"{"data": {"liveMeasurement": {"timestamp": "2024-07-26T12:06:33Z", "power": 12.5}}}"#
        )
        .is_err());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_reading("blah").is_err());
        assert!(parse_reading(r#"{"power": 100}"#).is_err());
        assert!(parse_reading(r#"{"type": "ka"}"#).is_err());
    }
}
