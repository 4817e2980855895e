//! Bridge orchestrator.
//!
//! Wires the camera client, poll loop, motion sensor and MQTT publisher
//! together so the host binary only deals with start and shutdown.

use crate::config::Config;
use crate::error::Result;
use crate::input::ReolinkClient;
use crate::motion::{MotionPoller, TransitionDispatcher};
use crate::mqtt::{ConnectionState, MqttPublisher};
use crate::sensors::{AccessoryInformation, MotionSensor};
use log::{info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A validated bridge, ready to start.
pub struct MotionBridge {
    config: Config,
    sensor: Arc<MotionSensor>,
}

impl MotionBridge {
    /// Validate the configuration. Fails fast on missing required values.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let sensor = Arc::new(MotionSensor::new(AccessoryInformation::new(
            config.name.clone(),
        )));
        Ok(Self { config, sensor })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared sensor the host reads from and subscribes to.
    pub fn sensor(&self) -> Arc<MotionSensor> {
        self.sensor.clone()
    }

    /// Connect to the broker and start polling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<BridgeHandle> {
        let client = ReolinkClient::new(&self.config.camera)?;
        info!(
            "[Reolink] Polling {} channel {}",
            client.endpoint(),
            client.channel()
        );

        let publisher = Arc::new(MqttPublisher::start(&self.config.mqtt)?);
        let dispatcher = TransitionDispatcher::new(
            self.sensor.clone(),
            publisher.clone(),
            self.config.mqtt.topic.clone(),
        );

        let cancel = CancellationToken::new();
        let poller = MotionPoller::new(
            client,
            dispatcher,
            self.config.poll.interval(),
            cancel.clone(),
        )
        .start();

        Ok(BridgeHandle {
            sensor: self.sensor,
            publisher,
            poller: Some(poller),
            cancel,
        })
    }
}

/// Running bridge.
pub struct BridgeHandle {
    sensor: Arc<MotionSensor>,
    publisher: Arc<MqttPublisher>,
    poller: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl BridgeHandle {
    pub fn sensor(&self) -> Arc<MotionSensor> {
        self.sensor.clone()
    }

    pub fn broker_state(&self) -> ConnectionState {
        self.publisher.state()
    }

    /// Stop polling first, then flush and close the broker session, so no
    /// transition is dispatched to a publisher that is already gone.
    pub async fn shutdown(mut self) {
        info!("Shutting down motion bridge...");
        self.cancel.cancel();
        if let Some(poller) = self.poller.take()
            && let Err(e) = poller.await
        {
            warn!("[Poll] Poll task ended abnormally: {}", e);
        }
        self.publisher.shutdown().await;
        info!("Motion bridge stopped");
    }
}
