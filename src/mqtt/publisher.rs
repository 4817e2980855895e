//! Long-lived MQTT session with an explicit connection state machine.
//!
//! `Disconnected -> Connecting -> Connected -> Reconnecting -> Connected ...`
//!
//! Publishes are accepted in every state. They wait in an [`OutboundQueue`]
//! until the session is `Connected` and are then handed to rumqttc in order.

use super::options::{mqtt_options, qos_from_level};
use super::queue::{OutboundMessage, OutboundQueue};
use super::StatePublisher;
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Capacity of rumqttc's internal request channel.
const CLIENT_CHANNEL_CAPACITY: usize = 16;

/// Upper bound on how long shutdown waits for queued publishes to go out.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// How soon a publish the client could not take is retried while connected.
const FLUSH_RETRY: Duration = Duration::from_millis(100);

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Handle to the background MQTT session.
pub struct MqttPublisher {
    tx: mpsc::Sender<OutboundMessage>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    /// Start the session task. Must be called from within a tokio runtime.
    ///
    /// Returns immediately; the connection is established in the background.
    pub fn start(config: &MqttConfig) -> Result<Self> {
        let options = mqtt_options(config)?;
        let qos = qos_from_level(config.qos)?;
        let (client, event_loop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let cancel = CancellationToken::new();

        let task = SessionTask {
            session: Session {
                client,
                state: state.clone(),
                qos,
                broker: config.broker.clone(),
            },
            event_loop,
            rx,
            queue: OutboundQueue::new(config.queue_capacity),
            cancel: cancel.clone(),
            reconnect_delay: config.reconnect_delay(),
        };

        info!("[MQTT] Connecting to {}", config.broker);
        let handle = tokio::spawn(task.run());

        Ok(Self {
            tx,
            state,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    /// Current broker session state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Flush pending publishes, disconnect and stop the session task.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("[MQTT] Publisher task ended abnormally: {}", e);
        }
    }
}

impl StatePublisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.tx
            .try_send(OutboundMessage::new(topic, payload, retain))
            .map_err(|e| match e {
                TrySendError::Full(_) => BridgeError::PublishQueueFull,
                TrySendError::Closed(_) => BridgeError::PublisherClosed,
            })
    }
}

/// Parts of the session touched from event handlers.
struct Session {
    client: AsyncClient,
    state: Arc<RwLock<ConnectionState>>,
    qos: QoS,
    broker: String,
}

impl Session {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!("[MQTT] {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn enqueue(&self, queue: &mut OutboundQueue, message: OutboundMessage) {
        if let Some(dropped) = queue.push(message) {
            warn!(
                "[MQTT] Outbound queue full, dropping {} for {}",
                dropped.payload, dropped.topic
            );
        }
    }

    /// Whether queued messages are waiting on a full client channel.
    fn has_backlog(&self, queue: &OutboundQueue) -> bool {
        self.state() == ConnectionState::Connected && !queue.is_empty()
    }

    /// Hand queued messages to the client while connected.
    fn flush(&self, queue: &mut OutboundQueue) {
        if self.state() != ConnectionState::Connected {
            return;
        }

        while let Some(message) = queue.pop() {
            match self.client.try_publish(
                message.topic.clone(),
                self.qos,
                message.retain,
                message.payload.clone().into_bytes(),
            ) {
                Ok(()) => {
                    debug!("[MQTT] Published {} to {}", message.payload, message.topic);
                }
                Err(e) => {
                    debug!("[MQTT] Client busy, keeping message queued: {}", e);
                    queue.requeue(message);
                    break;
                }
            }
        }
    }

    fn on_connected(&self, queue: &mut OutboundQueue) {
        self.set_state(ConnectionState::Connected);
        info!("[MQTT] Connected to broker {}", self.broker);
        if !queue.is_empty() {
            info!("[MQTT] Flushing {} queued message(s)", queue.len());
        }
        self.flush(queue);
    }

    fn on_connection_lost(&self, error: &str) {
        match self.state() {
            ConnectionState::Connected => {
                warn!("[MQTT] Connection to {} lost: {}", self.broker, error)
            }
            _ => warn!("[MQTT] Failed to connect to {}: {}", self.broker, error),
        }
        self.set_state(ConnectionState::Reconnecting);
    }
}

/// What the connection driver reports back to the session.
#[derive(Debug)]
enum LinkEvent {
    Connected,
    Lost(String),
    DisconnectSent,
}

/// Drive the rumqttc event loop until our DISCONNECT has been written.
///
/// Runs in its own task so a connect in progress is never cancelled by
/// activity elsewhere. Polling again after an error reconnects.
async fn drive_connection(
    mut event_loop: EventLoop,
    events: mpsc::UnboundedSender<LinkEvent>,
    reconnect_delay: Duration,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    let _ = events.send(LinkEvent::Connected);
                } else {
                    warn!("[MQTT] Broker refused connection: {:?}", ack.code);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                let _ = events.send(LinkEvent::DisconnectSent);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if events.send(LinkEvent::Lost(e.to_string())).is_err() {
                    break;
                }
                time::sleep(reconnect_delay).await;
                debug!("[MQTT] Reconnecting");
            }
        }
    }
}

/// Background task owning the outbound queue and the session state.
struct SessionTask {
    session: Session,
    event_loop: EventLoop,
    rx: mpsc::Receiver<OutboundMessage>,
    queue: OutboundQueue,
    cancel: CancellationToken,
    reconnect_delay: Duration,
}

impl SessionTask {
    async fn run(self) {
        let SessionTask {
            session,
            event_loop,
            mut rx,
            mut queue,
            cancel,
            reconnect_delay,
        } = self;

        let (link_tx, mut link_rx) = mpsc::unbounded_channel();
        let link = tokio::spawn(drive_connection(event_loop, link_tx, reconnect_delay));
        session.set_state(ConnectionState::Connecting);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => {
                        session.enqueue(&mut queue, message);
                        session.flush(&mut queue);
                    }
                    None => break,
                },
                event = link_rx.recv() => match event {
                    Some(LinkEvent::Connected) => session.on_connected(&mut queue),
                    Some(LinkEvent::Lost(error)) => session.on_connection_lost(&error),
                    Some(LinkEvent::DisconnectSent) | None => break,
                },
                _ = time::sleep(FLUSH_RETRY), if session.has_backlog(&queue) => {
                    session.flush(&mut queue);
                }
            }
        }

        Self::close(&session, &mut rx, &mut link_rx, &mut queue).await;
        link.abort();
        session.set_state(ConnectionState::Disconnected);
        info!("[MQTT] Publisher stopped");
    }

    async fn close(
        session: &Session,
        rx: &mut mpsc::Receiver<OutboundMessage>,
        link_rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
        queue: &mut OutboundQueue,
    ) {
        rx.close();
        while let Ok(message) = rx.try_recv() {
            session.enqueue(queue, message);
        }

        if session.state() == ConnectionState::Connected {
            session.flush(queue);
            if let Err(e) = session.client.try_disconnect() {
                warn!("[MQTT] Failed to request disconnect: {}", e);
            }

            // Requests are written in order, so seeing our DISCONNECT go out
            // means every publish before it has been written too.
            let drained = time::timeout(FLUSH_TIMEOUT, async {
                while let Some(event) = link_rx.recv().await {
                    if matches!(event, LinkEvent::DisconnectSent | LinkEvent::Lost(_)) {
                        break;
                    }
                }
            })
            .await;
            if drained.is_err() {
                warn!("[MQTT] Timed out flushing publishes on shutdown");
            }
        }

        if !queue.is_empty() {
            warn!(
                "[MQTT] Dropping {} unsent message(s) on shutdown",
                queue.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn test_config(broker: String) -> MqttConfig {
        let mut config = Config::default().mqtt;
        config.broker = broker;
        config.client_id = "publisher-test".to_string();
        config.reconnect_delay_ms = 50;
        config
    }

    /// Read one MQTT packet, returning the fixed header byte and the body.
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut remaining = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            remaining |= ((byte & 0x7F) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; remaining];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_flushed_on_connack() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let publisher = MqttPublisher::start(&test_config(format!("mqtt://127.0.0.1:{}", port)))
            .unwrap();

        // Accepted before the broker has acknowledged anything
        tokio_test::assert_ok!(publisher.publish("cam/motion", "ON", true));

        let (mut stream, _) = listener.accept().await.unwrap();
        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header, 0x10, "expected CONNECT");
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header, 0x31, "expected retained QoS 0 PUBLISH");
        let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        assert_eq!(&body[2..2 + topic_len], b"cam/motion");
        assert_eq!(&body[2 + topic_len..], b"ON");
        assert_eq!(publisher.state(), ConnectionState::Connected);

        publisher.shutdown().await;
        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header, 0xE0, "expected DISCONNECT");
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_backlog_beyond_client_channel_is_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let publisher = MqttPublisher::start(&test_config(format!("mqtt://127.0.0.1:{}", port)))
            .unwrap();

        // More than the client's request channel holds at once
        let total = CLIENT_CHANNEL_CAPACITY + 8;
        for i in 0..total {
            tokio_test::assert_ok!(publisher.publish("cam/motion", &i.to_string(), true));
        }

        let (mut stream, _) = listener.accept().await.unwrap();
        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header, 0x10, "expected CONNECT");
        stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

        for i in 0..total {
            let (header, body) = time::timeout(Duration::from_secs(2), read_packet(&mut stream))
                .await
                .expect("queued publish was never retried");
            assert_eq!(header, 0x31);
            let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
            assert_eq!(&body[2 + topic_len..], i.to_string().as_bytes());
        }

        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_broker_accepts_publishes_and_shuts_down() {
        // Grab a free port, then close it so connections are refused
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let publisher = MqttPublisher::start(&test_config(format!("mqtt://127.0.0.1:{}", port)))
            .unwrap();

        tokio_test::assert_ok!(publisher.publish("cam/motion", "ON", true));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_ne!(publisher.state(), ConnectionState::Connected);
        tokio_test::assert_ok!(publisher.publish("cam/motion", "OFF", true));

        time::timeout(Duration::from_secs(5), publisher.shutdown())
            .await
            .expect("shutdown should not hang");
        assert_eq!(publisher.state(), ConnectionState::Disconnected);

        assert!(matches!(
            publisher.publish("cam/motion", "ON", true),
            Err(BridgeError::PublisherClosed)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_bad_broker() {
        let config = test_config("ws://broker.lan".to_string());
        assert!(matches!(
            MqttPublisher::start(&config),
            Err(BridgeError::InvalidBrokerAddress(_))
        ));
    }
}
