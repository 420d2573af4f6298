//! Check configuration and devices.

use handguide_common::ConfigStore;

pub fn run(store: &ConfigStore) -> anyhow::Result<()> {
    println!("HandGuide System Check");
    println!("{}", "=".repeat(50));

    let config = store.snapshot();
    if let Some(path) = store.path() {
        let note = if path.exists() { "" } else { " (not written yet)" };
        println!("[OK] Config file: {}{note}", path.display());
    }

    let config_ok = match config.validate() {
        Ok(()) => {
            println!(
                "[OK] Calibration: devicePPI {} / DPR {} / worldPPI {}",
                config.calibration.device_ppi,
                config.calibration.device_pixel_ratio,
                config.calibration.world_ppi
            );
            true
        }
        Err(e) => {
            println!("[FAIL] {e}");
            false
        }
    };

    println!(
        "[OK] Testbed: {} x {} mm",
        config.testbed.width_mm, config.testbed.height_mm
    );
    println!("[OK] Data directory: {}", config.data_dir.display());

    println!();
    match handguide_serial::available_ports() {
        Ok(ports) if ports.is_empty() => println!("[WARN] No serial ports found"),
        Ok(ports) => {
            println!("[OK] Serial ports: {}", ports.len());
            for p in &ports {
                let last = config.serial.port.as_deref() == Some(p.name.as_str());
                println!("     {} ({}){}", p.name, p.kind, if last { " (last used)" } else { "" });
            }
        }
        Err(e) => println!("[WARN] Cannot list serial ports: {e}"),
    }

    println!();
    if config_ok {
        println!("Configuration is valid. HandGuide is ready.");
    } else {
        println!("Configuration is invalid. Run `handguide config reset` to restore defaults.");
    }

    Ok(())
}
