//! MQTT 3.1.1 publish sink: QoS 0 publishes over plain TCP.

use tracing::{debug, warn};

use mqtt_client::MqttClient;

use crate::{error::SensorError, services::PublishSink};

pub mod mqtt_client;
pub mod packets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttClientState {
    Disconnected,
    Connected,
}

/// Publishes to one fixed topic, connecting on demand.
pub struct MqttConnector {
    pub state: MqttClientState,
    pub client: MqttClient,
    topic: String,
}

impl MqttConnector {
    pub fn new(client: MqttClient, topic: impl Into<String>) -> Self {
        Self {
            state: MqttClientState::Disconnected,
            client,
            topic: topic.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, MqttClientState::Connected)
    }

    /// Connects if there is no live connection. A connection the broker
    /// has closed since the last publish (keep-alive expiry, suspend) counts
    /// as gone.
    pub async fn reconnect(&mut self) -> Result<(), SensorError> {
        if self.is_connected() && self.client.is_closed() {
            warn!("Broker closed the connection, reconnecting");
            self.client.close();
            self.state = MqttClientState::Disconnected;
        }
        match self.state {
            MqttClientState::Disconnected => {
                debug!(broker = self.client.broker_address(), "Connecting to broker");
                self.client.connect().await?;
                self.state = MqttClientState::Connected;
                Ok(())
            }
            MqttClientState::Connected => Ok(()),
        }
    }

    /// Publishes on the current connection. A failed publish drops the
    /// connection so the next [`PublishSink::publish`] reconnects.
    pub async fn try_publish(&mut self, data: &[u8]) -> Result<(), SensorError> {
        match self.state {
            MqttClientState::Connected => match self.client.publish(&self.topic, data).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!("Publish failed, dropping connection: {e}");
                    if let Err(e) = self.client.disconnect().await {
                        debug!("Disconnect after failed publish: {e}");
                    }
                    self.state = MqttClientState::Disconnected;
                    Err(e)
                }
            },
            MqttClientState::Disconnected => Err(SensorError::Disconnected),
        }
    }
}

impl PublishSink for MqttConnector {
    async fn publish(&mut self, payload: &[u8]) -> Result<(), SensorError> {
        self.reconnect().await?;
        self.try_publish(payload).await
    }
}
