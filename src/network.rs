use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::{
    error::SensorError,
    measurement::DeviceId,
    services::NetworkJoin,
};

const SYSFS_NET: &str = "/sys/class/net";
const LINK_POLL: Duration = Duration::from_millis(1000);

/// Waits for a kernel-managed interface (brought up by wpa_supplicant,
/// NetworkManager or similar) to report link up.
pub struct InterfaceJoin {
    interface_dir: PathBuf,
    timeout: Duration,
    poll: Duration,
}

impl InterfaceJoin {
    pub fn new(interface: &str, timeout: Duration) -> Self {
        Self::with_sysfs_root(SYSFS_NET, interface, timeout)
    }

    pub fn with_sysfs_root(root: impl AsRef<Path>, interface: &str, timeout: Duration) -> Self {
        Self {
            interface_dir: root.as_ref().join(interface),
            timeout,
            poll: LINK_POLL,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    async fn attribute(&self, name: &str) -> Result<String, SensorError> {
        let path = self.interface_dir.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map(|s| s.trim().to_owned())
            .map_err(|e| SensorError::device(path, e))
    }

    /// `up`, or `unknown` with carrier for drivers that never report
    /// operational state.
    async fn link_up(&self) -> Result<bool, SensorError> {
        match self.attribute("operstate").await?.as_str() {
            "up" => Ok(true),
            // carrier is unreadable while the interface is administratively down
            "unknown" => Ok(self.attribute("carrier").await.is_ok_and(|c| c == "1")),
            _ => Ok(false),
        }
    }

    async fn wait_for_link(&self) -> Result<(), SensorError> {
        loop {
            debug!("checking link state");
            if self.link_up().await? {
                return Ok(());
            }
            sleep(self.poll).await;
        }
    }
}

impl NetworkJoin for InterfaceJoin {
    async fn join(&mut self) -> Result<DeviceId, SensorError> {
        timeout(self.timeout, self.wait_for_link())
            .await
            .map_err(|_| SensorError::Timeout("network link"))??;
        debug!("Link is up");
        let address = self.attribute("address").await?;
        device_id_from_mac(&address)
    }
}

/// The last three octets of a `aa:bb:cc:dd:ee:ff` hardware address as
/// uppercase hex, e.g. `b8:27:eb:ab:c1:23` gives `ABC123`.
pub fn device_id_from_mac(mac: &str) -> Result<DeviceId, SensorError> {
    let malformed = || SensorError::Protocol(format!("malformed hardware address {mac:?}"));

    let octets = mac
        .split(':')
        .map(|part| match part.len() {
            2 => u8::from_str_radix(part, 16).map_err(|_| malformed()),
            _ => Err(malformed()),
        })
        .collect::<Result<Vec<u8>, _>>()?;
    if octets.len() != 6 {
        return Err(malformed());
    }

    let mut id = DeviceId::new();
    for octet in octets.iter().skip(3) {
        write!(id, "{octet:02X}").map_err(|_| malformed())?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::ErrorCategory;

    fn fake_interface(operstate: &str, address: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let iface = root.path().join("wlan0");
        fs::create_dir(&iface).unwrap();
        fs::write(iface.join("operstate"), operstate).unwrap();
        fs::write(iface.join("address"), address).unwrap();
        root
    }

    #[test]
    fn derives_id_from_last_three_octets() {
        assert_eq!(device_id_from_mac("b8:27:eb:ab:c1:23").unwrap().as_str(), "ABC123");
        assert_eq!(device_id_from_mac("00:00:00:00:00:0f").unwrap().as_str(), "00000F");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(device_id_from_mac("").is_err());
        assert!(device_id_from_mac("b8:27:eb:ab:c1").is_err());
        assert!(device_id_from_mac("b8:27:eb:ab:c1:zz").is_err());
        assert!(device_id_from_mac("b8:27:eb:ab:c1:234").is_err());
    }

    #[tokio::test]
    async fn joins_once_link_is_up() {
        let root = fake_interface("up\n", "b8:27:eb:ab:c1:23\n");
        let mut join = InterfaceJoin::with_sysfs_root(root.path(), "wlan0", Duration::from_secs(1));
        assert_eq!(join.join().await.unwrap().as_str(), "ABC123");
    }

    #[tokio::test]
    async fn unknown_operstate_with_carrier_counts_as_up() {
        let root = fake_interface("unknown\n", "b8:27:eb:ab:c1:23\n");
        fs::write(root.path().join("wlan0/carrier"), "1\n").unwrap();
        let mut join = InterfaceJoin::with_sysfs_root(root.path(), "wlan0", Duration::from_secs(1));
        assert_eq!(join.join().await.unwrap().as_str(), "ABC123");
    }

    #[tokio::test]
    async fn unknown_operstate_without_carrier_keeps_waiting() {
        let root = fake_interface("unknown\n", "b8:27:eb:ab:c1:23\n");
        fs::write(root.path().join("wlan0/carrier"), "0\n").unwrap();
        let mut join =
            InterfaceJoin::with_sysfs_root(root.path(), "wlan0", Duration::from_millis(50))
                .with_poll_interval(Duration::from_millis(10));
        let err = join.join().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn times_out_while_link_is_down() {
        let root = fake_interface("down\n", "b8:27:eb:ab:c1:23\n");
        let mut join =
            InterfaceJoin::with_sysfs_root(root.path(), "wlan0", Duration::from_millis(50))
                .with_poll_interval(Duration::from_millis(10));
        let err = join.join().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[tokio::test]
    async fn missing_interface_is_a_connectivity_error() {
        let root = tempfile::tempdir().unwrap();
        let mut join = InterfaceJoin::with_sysfs_root(root.path(), "eth9", Duration::from_secs(1));
        let err = join.join().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Connectivity);
    }
}
