use std::{io, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use super::packets::{
    build_connect_packet, build_disconnect_packet, build_publish_packet, parse_connack,
    CONNACK_LEN,
};
use crate::error::SensorError;

const CONNACK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MqttClient {
    stream: Option<TcpStream>,
    broker_address: String,
    client_id: String,
}

impl MqttClient {
    pub fn new(broker_address: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            stream: None,
            broker_address: broker_address.into(),
            client_id: client_id.into(),
        }
    }

    pub fn broker_address(&self) -> &str {
        &self.broker_address
    }

    /// Whether the broker has closed its side of the connection. Only looks
    /// at what the kernel has already received, it never waits.
    pub fn is_closed(&self) -> bool {
        let Some(stream) = &self.stream else {
            return true;
        };
        let mut buf = [0u8; 64];
        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => return true,
                Ok(n) => debug!(bytes = n, "Discarding unsolicited broker data"),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    debug!("Broker connection failed: {e}");
                    return true;
                }
            }
        }
    }

    /// Drops the socket without saying goodbye.
    pub fn close(&mut self) {
        self.stream = None;
    }

    pub async fn connect(&mut self) -> Result<(), SensorError> {
        self.stream = None;
        let stream = timeout(
            CONNACK_TIMEOUT,
            inner_connect(&self.broker_address, &self.client_id),
        )
        .await
        .map_err(|_| SensorError::Timeout("CONNACK"))??;
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn publish(&mut self, topic: &str, data: &[u8]) -> Result<(), SensorError> {
        let packet = build_publish_packet(topic, data)?;
        let stream = self.stream.as_mut().ok_or(SensorError::Disconnected)?;
        stream.write_all(&packet).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Sends DISCONNECT if possible and drops the socket either way.
    pub async fn disconnect(&mut self) -> Result<(), SensorError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let packet = build_disconnect_packet()?;
        stream.write_all(&packet).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

async fn inner_connect(broker_address: &str, client_id: &str) -> Result<TcpStream, SensorError> {
    let mut stream = TcpStream::connect(broker_address).await?;
    stream.set_nodelay(true)?;

    let connect_packet = build_connect_packet(client_id)?;
    stream.write_all(&connect_packet).await?;
    debug!("Connect sent - awaiting ack");

    let mut connack = [0u8; CONNACK_LEN];
    stream.read_exact(&mut connack).await?;
    parse_connack(&connack)?;
    debug!("Connack accepted");
    Ok(stream)
}
