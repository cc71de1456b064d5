//! Minimal SNTPv4 client (RFC 4330): one request, one reply, no clock
//! discipline.

use std::time::Duration;

use tokio::{net::UdpSocket, time::timeout};
use tracing::debug;

use crate::{error::SensorError, services::TimeSource};

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
pub const PACKET_LEN: usize = 48;

const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const VERSION: u8 = 4;
const TRANSMIT_SECONDS: core::ops::Range<usize> = 40..44;
/// Length of one NTP era in seconds.
const ERA: u64 = 1 << 32;

pub struct SntpClient {
    server: String,
    timeout: Duration,
}

impl SntpClient {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }

    async fn exchange(&self) -> Result<u64, SensorError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&self.server).await?;
        socket.send(&build_request()).await?;

        let mut buf = [0u8; 128];
        let n = socket.recv(&mut buf).await?;
        debug!(bytes = n, "SNTP reply received");
        parse_response(buf.get(..n).unwrap_or_default())
    }
}

impl TimeSource for SntpClient {
    async fn sync(&mut self) -> Result<u64, SensorError> {
        timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| SensorError::Timeout("SNTP reply"))?
    }
}

pub fn build_request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    // LI = 0 (no warning), VN = 4, Mode = 3 (client)
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Extracts the server transmit timestamp as Unix seconds.
pub fn parse_response(buf: &[u8]) -> Result<u64, SensorError> {
    let too_short = || SensorError::Protocol(format!("SNTP reply too short: {} bytes", buf.len()));
    if buf.len() < PACKET_LEN {
        return Err(too_short());
    }
    let (Some(&flags), Some(&stratum), Some(transmit)) =
        (buf.first(), buf.get(1), buf.get(TRANSMIT_SECONDS))
    else {
        return Err(too_short());
    };
    if flags & 0x07 != MODE_SERVER {
        return Err(SensorError::Protocol(format!(
            "unexpected SNTP mode {}",
            flags & 0x07
        )));
    }
    if stratum == 0 {
        return Err(SensorError::Protocol("SNTP kiss-of-death".into()));
    }

    let mut seconds = [0u8; 4];
    seconds.copy_from_slice(transmit);
    let raw = u32::from_be_bytes(seconds);
    if raw == 0 {
        return Err(SensorError::Protocol("SNTP reply without transmit time".into()));
    }
    // RFC 4330 section 3: with the top bit clear the time is in era 1,
    // i.e. on or after 2036-02-07T06:28:16Z.
    let ntp_seconds = if raw & 0x8000_0000 == 0 {
        u64::from(raw) + ERA
    } else {
        u64::from(raw)
    };
    ntp_seconds
        .checked_sub(NTP_UNIX_OFFSET)
        .ok_or_else(|| SensorError::Protocol(format!("SNTP time {ntp_seconds} predates 1970")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn server_reply(unix_seconds: u64) -> [u8; PACKET_LEN] {
        let mut reply = [0u8; PACKET_LEN];
        reply[0] = (VERSION << 3) | MODE_SERVER;
        reply[1] = 2;
        let ntp = ((unix_seconds + NTP_UNIX_OFFSET) % ERA) as u32;
        reply[40..44].copy_from_slice(&ntp.to_be_bytes());
        reply
    }

    #[test]
    fn request_is_a_v4_client_packet() {
        let request = build_request();
        assert_eq!(request.len(), 48);
        assert_eq!(request[0], 0x23);
        assert!(request[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn parses_transmit_timestamp() {
        assert_eq!(parse_response(&server_reply(1_700_000_100)).unwrap(), 1_700_000_100);
    }

    #[test]
    fn transmit_time_past_2036_wraps_into_era_one() {
        // one second into era 1 (raw 0 means "no timestamp")
        assert_eq!(parse_response(&server_reply(2_085_978_497)).unwrap(), 2_085_978_497);
        assert_eq!(parse_response(&server_reply(2_100_000_000)).unwrap(), 2_100_000_000);
        // last second of era 0
        assert_eq!(parse_response(&server_reply(2_085_978_495)).unwrap(), 2_085_978_495);
    }

    #[test]
    fn rejects_bad_replies() {
        assert!(parse_response(&[0x24; 20]).is_err());

        let mut wrong_mode = server_reply(1_700_000_000);
        wrong_mode[0] = (VERSION << 3) | MODE_CLIENT;
        assert!(parse_response(&wrong_mode).is_err());

        let mut kiss = server_reply(1_700_000_000);
        kiss[1] = 0;
        assert!(parse_response(&kiss).is_err());

        let mut empty = server_reply(1_700_000_000);
        empty[40..44].fill(0);
        assert!(parse_response(&empty).is_err());
    }

    #[tokio::test]
    async fn syncs_against_a_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; PACKET_LEN];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(n, PACKET_LEN);
            assert_eq!(buf[0] & 0x07, MODE_CLIENT);
            server.send_to(&server_reply(1_700_000_100), peer).await.unwrap();
        });

        let mut client = SntpClient::new(addr.to_string(), Duration::from_secs(3));
        assert_eq!(client.sync().await.unwrap(), 1_700_000_100);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut client =
            SntpClient::new(server.local_addr().unwrap().to_string(), Duration::from_millis(50));
        let err = client.sync().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }
}
