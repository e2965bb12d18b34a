use std::str::from_utf8;
use std::thread;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use rumqttc::{Client, Connection, ConnectionError, Event, MqttOptions, Outgoing, Packet, QoS};
use thiserror::Error;

use crate::constants::defaults;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Error, Debug)]
pub enum MqttError {
    #[error(transparent)]
    MqttClient(#[from] rumqttc::ClientError),
}

pub fn get_rand_client_id(prefix: Option<&str>) -> String {
    let randhex = hex::encode(rand::random::<[u8; 3]>());

    if let Some(pref) = prefix {
        format!("{pref}-{randhex}")
    } else {
        randhex
    }
}

pub fn client_conn(host: &str, port: u16, client_id: String) -> (Client, Connection) {
    log::info!("Establishing MQTT connection to {host}:{port} as {client_id}");

    let mut mqttoptions = MqttOptions::new(client_id, host, port);
    mqttoptions.set_clean_session(true);
    mqttoptions.set_keep_alive(KEEP_ALIVE);

    Client::new(mqttoptions, 10)
}

fn reconnect_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_interval: defaults::MQTT_RECONNECT_MAX_INTERVAL,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Passes every message published on `topic` to `func`.
///
/// Connection errors are logged and retried with exponential backoff, and the
/// subscription is renewed on every (re)connect. Returns once the client has
/// been disconnected.
pub fn sub_topic<F>(
    client: Client,
    mut connection: Connection,
    topic: &str,
    mut func: F,
) -> Result<(), MqttError>
where
    F: FnMut(MqttMessage),
{
    let mut backoff = reconnect_backoff();

    for notification in connection.iter() {
        log::trace!("Notification = {:?}", notification);
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                log::info!("Subscribing to {}", topic);
                client.subscribe(topic, QoS::AtMostOnce)?;
            }
            Ok(Event::Incoming(Packet::Publish(p))) => match from_utf8(&p.payload) {
                Ok(payload) => func(MqttMessage {
                    topic: p.topic,
                    payload: payload.into(),
                }),
                Err(e) => log::warn!("Dropping non-UTF-8 message on {}: {}", p.topic, e),
            },
            Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(ConnectionError::RequestsDone) => {
                log::info!("MQTT client disconnected");
                break;
            }
            Ok(_) => (),
            Err(e) => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or(defaults::MQTT_RECONNECT_MAX_INTERVAL);
                log::error!(
                    "MQTT connection error: {}; reconnecting in {:.1}s",
                    e,
                    delay.as_secs_f32()
                );
                thread::sleep(delay);
            }
        }
    }
    Ok(())
}
