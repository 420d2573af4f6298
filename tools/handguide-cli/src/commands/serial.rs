//! Serial port utilities.

use handguide_common::{ConfigStore, SerialConfig};
use handguide_serial::{available_ports, SerialLink};
use tokio::sync::broadcast;

pub fn list() -> anyhow::Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for p in &ports {
        println!("{}\t{}", p.name, p.kind);
    }
    Ok(())
}

/// Print inbound lines and IMU readings until the port closes or Ctrl-C.
pub async fn monitor(store: &ConfigStore, port: String, baud: Option<u32>) -> anyhow::Result<()> {
    let config = SerialConfig {
        baud_rate: baud.unwrap_or(store.snapshot().serial.baud_rate),
        ..store.snapshot().serial
    };
    let link = SerialLink::open(&port, &config)?;
    store.update(|c| c.serial.port = Some(port.clone()))?;
    println!("Monitoring {} at {} baud (Ctrl-C to stop)", port, config.baud_rate);

    let mut lines = link.subscribe_lines();
    let mut imu = link.subscribe_imu();
    let mut state = link.subscribe_state();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.recv() => match line {
                Ok(line) => println!("< {line}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Monitor fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = imu.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(r) = *imu.borrow_and_update() {
                    println!("imu ax={:.3} ay={:.3} az={:.3}", r.ax, r.ay, r.az);
                }
            }
            changed = state.changed() => {
                if changed.is_err() || !state.borrow_and_update().is_connected() {
                    println!("Port disconnected");
                    break;
                }
            }
        }
    }

    link.shutdown().await;
    Ok(())
}
