use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

use crate::error::Error;

/// Open the local device non-blocking, 8 data bits, no parity, 1 stop bit.
pub fn open(path: &str, baud: u32) -> Result<SerialStream, Error> {
    let serial_stream = tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| Error::OpenLocal {
            path: path.into(),
            problem: format!("{e}"),
        })?;

    info!(%path, %baud, "Opened serial port");

    Ok(serial_stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_device_is_setup_error() {
        let Err(err) = open("/dev/this-tty-does-not-exist", 19_200) else {
            panic!("Opening a missing device should fail");
        };

        assert!(matches!(err, Error::OpenLocal { path, .. } if path == "/dev/this-tty-does-not-exist"));
    }
}
