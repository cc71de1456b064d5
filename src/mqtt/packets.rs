use mqttrs::{
    decode_slice, encode_slice, Connack, Connect, ConnectReturnCode, Packet, Protocol, Publish,
    QosPid,
};

use crate::error::SensorError;

pub const KEEP_ALIVE_SECS: u16 = 120;
/// CONNACK is 2-byte fixed header + 2-byte variable header.
pub const CONNACK_LEN: usize = 4;

/// Fixed header (up to 5 bytes) plus the topic length prefix.
const PUBLISH_OVERHEAD: usize = 7;

pub fn build_connect_packet(client_id: &str) -> Result<Vec<u8>, SensorError> {
    let packet: Packet = Connect {
        protocol: Protocol::MQTT311,
        keep_alive: KEEP_ALIVE_SECS,
        client_id,
        clean_session: true,
        last_will: None,
        username: None,
        password: None,
    }
    .into();

    let mut buf = vec![0u8; 16 + client_id.len()];
    let packet_length = encode_slice(&packet, &mut buf)?;
    buf.truncate(packet_length);
    Ok(buf)
}

/// Accepts only a CONNACK carrying `Accepted`.
pub fn parse_connack(buf: &[u8]) -> Result<(), SensorError> {
    match decode_slice(buf)? {
        Some(Packet::Connack(Connack { code, .. })) => {
            if code == ConnectReturnCode::Accepted {
                Ok(())
            } else {
                Err(SensorError::Protocol(format!("connection refused: {code:?}")))
            }
        }
        Some(other) => Err(SensorError::Protocol(format!("expected CONNACK, got {other:?}"))),
        None => Err(SensorError::Protocol("incomplete CONNACK".into())),
    }
}

pub fn build_publish_packet(topic: &str, payload: &[u8]) -> Result<Vec<u8>, SensorError> {
    let packet: Packet = Publish {
        dup: false,
        qospid: QosPid::AtMostOnce,
        retain: false,
        topic_name: topic,
        payload,
    }
    .into();

    let mut buf = vec![0u8; PUBLISH_OVERHEAD + topic.len() + payload.len()];
    let packet_length = encode_slice(&packet, &mut buf)?;
    buf.truncate(packet_length);
    Ok(buf)
}

pub fn build_disconnect_packet() -> Result<Vec<u8>, SensorError> {
    let mut buf = [0u8; 2];
    let packet_length = encode_slice(&Packet::Disconnect, &mut buf)?;
    Ok(buf[..packet_length].to_vec())
}
