//! Command implementations for the CLI.

mod config;
mod read;
mod scan;
mod services;
mod watch;

pub use config::cmd_config;
pub use read::{ReadArgs, cmd_read, cmd_snapshot};
pub use scan::cmd_scan;
pub use services::cmd_services;
pub use watch::{WatchArgs, cmd_watch};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use sensortag_core::mock::{MockPeripheral, MockTransport};
    use sensortag_core::{ConnectionConfig, GattClient};

    pub const TAG_ADDRESS: &str = "B0:B4:48:C0:5D:01";

    pub fn mock_client() -> (Arc<MockTransport>, GattClient) {
        let transport = Arc::new(
            MockTransport::new()
                .with_peripheral(
                    MockPeripheral::sensortag("CC2650 SensorTag")
                        .address(TAG_ADDRESS)
                        .rssi(-55),
                )
                .with_peripheral(MockPeripheral::new("Kitchen Speaker").rssi(-80)),
        );
        let config = ConnectionConfig::fast().discovery_window(Duration::from_millis(20));
        let client = GattClient::with_config(transport.clone(), config).unwrap();
        (transport, client)
    }
}
