//! MQTT Client Wrapper
//!
//! Builds `rumqttc` options from configuration (broker address, credentials,
//! TLS material) and drives the event loop: subscribe on every CONNACK so
//! the subscription survives reconnects, hand inbound publishes to the
//! bridge, log delivery results, and back off exponentially on connection
//! errors. Teardown supports draining in-flight publishes before the
//! DISCONNECT goes out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing,
    SubscribeReasonCode, Transport,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::config::{MqttConfig, TlsConfig};

use super::{qos_level, InboundHandler, MqttError, MqttPublisher, MqttStatus};

/// Reconnect backoff schedule: 1s initial, x1.2 per attempt, 20s cap.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(20);
const BACKOFF_MULTIPLIER: f64 = 1.2;

/// Upper bound for flushing in-flight publishes at teardown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the request channel between client handle and event loop.
const REQUEST_CAPACITY: usize = 100;

/// MQTT client capability: a `rumqttc` handle plus the task polling its
/// event loop.
pub struct MqttClient {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
    sub_topic: String,
    sub_qos: rumqttc::QoS,
    status: Arc<RwLock<MqttStatus>>,
    task: Option<JoinHandle<()>>,
}

impl MqttClient {
    /// Build the client from configuration.
    ///
    /// QoS levels and the broker address are validated here, before any
    /// network activity; the connection itself is not attempted until
    /// [`MqttClient::start`].
    pub fn new(config: &MqttConfig) -> Result<Self, MqttError> {
        let sub_qos = qos_level(config.sub.qos)?;
        qos_level(config.publish.qos)?;

        let options = build_options(config)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        Ok(Self {
            client,
            eventloop: Some(eventloop),
            sub_topic: config.sub.topic.clone(),
            sub_qos,
            status: Arc::new(RwLock::new(MqttStatus::Disconnected)),
            task: None,
        })
    }

    /// A cloneable publish handle for the forwarding bridge.
    pub fn publisher(&self) -> Arc<dyn MqttPublisher> {
        Arc::new(PublishHandle {
            client: self.client.clone(),
        })
    }

    /// Current connection status.
    pub fn status(&self) -> MqttStatus {
        *self.status.read()
    }

    /// Spawn the event-loop task. Inbound publishes are delivered to
    /// `handler` from that task, serialized in delivery order.
    pub fn start(&mut self, handler: Arc<dyn InboundHandler>) {
        let eventloop = match self.eventloop.take() {
            Some(eventloop) => eventloop,
            None => return, // already started
        };

        let client = self.client.clone();
        let status = self.status.clone();
        let sub_topic = self.sub_topic.clone();
        let sub_qos = self.sub_qos;

        self.task = Some(tokio::spawn(async move {
            event_loop(eventloop, client, status, sub_topic, sub_qos, handler).await;
        }));
    }

    /// Tear down the client.
    ///
    /// With `drain` set, a DISCONNECT is queued behind any pending publishes
    /// and the event loop is given a bounded window to flush them; without
    /// it the task is stopped immediately.
    pub async fn destroy(mut self, drain: bool) {
        let task = match self.task.take() {
            Some(task) => task,
            None => return,
        };

        if drain {
            if let Err(e) = self.client.disconnect().await {
                debug!("disconnect request not delivered: {}", e);
            }
            let mut task = task;
            if timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
                warn!("mqtt client did not drain within {:?}, aborting", DRAIN_TIMEOUT);
                task.abort();
            }
        } else {
            task.abort();
        }

        *self.status.write() = MqttStatus::Disconnected;
    }
}

/// Publish handle handed to the forwarding bridge.
struct PublishHandle {
    client: AsyncClient,
}

#[async_trait]
impl MqttPublisher for PublishHandle {
    async fn publish(&self, topic: &str, qos: rumqttc::QoS, payload: Bytes) -> Result<(), MqttError> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Client(e.to_string()))
    }
}

async fn event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    status: Arc<RwLock<MqttStatus>>,
    sub_topic: String,
    sub_qos: rumqttc::QoS,
    handler: Arc<dyn InboundHandler>,
) {
    let mut backoff = INITIAL_BACKOFF;
    *status.write() = MqttStatus::Connecting;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("connected to mqtt broker, subscribing to [{}]", sub_topic);
                    *status.write() = MqttStatus::Connected;
                    backoff = INITIAL_BACKOFF;

                    // Re-issued on every CONNACK so the subscription
                    // survives reconnects with clean sessions.
                    if let Err(e) = client.try_subscribe(&sub_topic, sub_qos) {
                        error!("failed to request subscription to [{}]: {}", sub_topic, e);
                    }
                } else {
                    error!("mqtt broker rejected connection with code {:?}", ack.code);
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                info!("recv msg from topic [{}]", publish.topic);
                handler.on_message(&publish.topic, publish.payload).await;
            }
            Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                let failed = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if failed {
                    error!("failed to subscribe to topic [{}]", sub_topic);
                } else {
                    info!("subscribed to topic [{}]", sub_topic);
                }
            }
            Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                debug!("publish acknowledged (pkid={})", ack.pkid);
            }
            Ok(Event::Incoming(Incoming::PubComp(ack))) => {
                debug!("publish completed (pkid={})", ack.pkid);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("mqtt client disconnected");
                *status.write() = MqttStatus::Disconnected;
                return;
            }
            Ok(event) => {
                trace!(?event, "mqtt event");
            }
            Err(e) => {
                error!("exception on mqtt connection: {}", e);
                *status.write() = MqttStatus::Backoff;
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                *status.write() = MqttStatus::Connecting;
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    std::cmp::min(current.mul_f64(BACKOFF_MULTIPLIER), MAX_BACKOFF)
}

/// Parse a broker address (`tcp://host:port`, `ssl://host:port`, bare
/// `host:port`) into host, port and whether the scheme implies TLS.
fn parse_broker(broker: &str) -> Result<(String, u16, bool), MqttError> {
    let (scheme, rest) = broker.split_once("://").unwrap_or(("tcp", broker));

    let tls = match scheme {
        "tcp" | "mqtt" => false,
        "ssl" | "tls" | "mqtts" => true,
        other => {
            return Err(MqttError::Options(format!(
                "unsupported broker scheme [{}] in [{}]",
                other, broker
            )))
        }
    };

    if rest.is_empty() {
        return Err(MqttError::Options(format!("empty broker addr [{}]", broker)));
    }

    let default_port = if tls { 8883 } else { 1883 };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str.parse::<u16>().map_err(|_| {
                MqttError::Options(format!("invalid broker port in [{}]", broker))
            })?;
            (host.to_string(), port)
        }
        None => (rest.to_string(), default_port),
    };

    Ok((host, port, tls))
}

fn build_options(config: &MqttConfig) -> Result<MqttOptions, MqttError> {
    let (host, port, tls_scheme) = parse_broker(&config.broker)?;

    let connect = config.connect_packet.clone().unwrap_or_default();
    let client_id = if connect.client_id.is_empty() {
        format!("mqfwd-{}", std::process::id())
    } else {
        connect.client_id.clone()
    };

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_clean_session(connect.clean_session);

    // rumqttc requires a keep-alive of at least 5 seconds.
    let keepalive = if connect.keepalive == 0 {
        60
    } else {
        connect.keepalive.max(5)
    };
    options.set_keep_alive(Duration::from_secs(u64::from(keepalive)));

    if !connect.username.is_empty() {
        options.set_credentials(connect.username, connect.password);
    }

    if let Some(tls) = &config.tls {
        let tls_config = build_tls_config(tls)?;
        options.set_transport(Transport::tls_with_config(tls_config.into()));
    } else if tls_scheme {
        let tls_config = build_tls_config(&TlsConfig::default())?;
        options.set_transport(Transport::tls_with_config(tls_config.into()));
    }

    Ok(options)
}

/// Assemble a rustls client config from the configured TLS material.
/// System roots are always loaded; a custom CA and client cert/key pair are
/// added when configured.
fn build_tls_config(tls: &TlsConfig) -> Result<rustls::ClientConfig, MqttError> {
    use rustls::pki_types::{CertificateDer, PrivateKeyDer};
    use std::io::BufReader;

    let mut root_store = rustls::RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs()
        .map_err(|e| MqttError::Options(format!("failed to load system roots: {}", e)))?;
    for cert in native {
        root_store.add(cert).ok();
    }

    if let Some(ca_file) = &tls.ca_file {
        let file = std::fs::File::open(ca_file)
            .map_err(|e| MqttError::Options(format!("failed to open ca_file [{}]: {}", ca_file, e)))?;
        let mut reader = BufReader::new(file);
        let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut reader)
            .filter_map(|r| r.ok())
            .collect();
        for cert in certs {
            root_store
                .add(cert)
                .map_err(|e| MqttError::Options(format!("invalid ca cert: {}", e)))?;
        }
    }

    let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);

    let tls_config = if let (Some(cert_file), Some(key_file)) = (&tls.cert_file, &tls.key_file) {
        let file = std::fs::File::open(cert_file).map_err(|e| {
            MqttError::Options(format!("failed to open cert_file [{}]: {}", cert_file, e))
        })?;
        let mut reader = BufReader::new(file);
        let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut reader)
            .filter_map(|r| r.ok())
            .collect();

        let file = std::fs::File::open(key_file).map_err(|e| {
            MqttError::Options(format!("failed to open key_file [{}]: {}", key_file, e))
        })?;
        let mut reader = BufReader::new(file);
        let key: PrivateKeyDer = rustls_pemfile::private_key(&mut reader)
            .map_err(|e| MqttError::Options(format!("failed to read private key: {}", e)))?
            .ok_or_else(|| {
                MqttError::Options(format!("no private key found in [{}]", key_file))
            })?;

        builder
            .with_client_auth_cert(certs, key)
            .map_err(|e| MqttError::Options(format!("invalid client cert/key: {}", e)))?
    } else {
        builder.with_no_client_auth()
    };

    Ok(tls_config)
}
