//! Show, reset, or locate the configuration.

use handguide_common::ConfigStore;

pub fn show(store: &ConfigStore) -> anyhow::Result<()> {
    let config = store.snapshot();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn reset(store: &ConfigStore) -> anyhow::Result<()> {
    store.reset()?;
    match store.path() {
        Some(path) => println!("Configuration reset: {}", path.display()),
        None => println!("Configuration reset"),
    }
    Ok(())
}

pub fn path(store: &ConfigStore) -> anyhow::Result<()> {
    match store.path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(in memory)"),
    }
    Ok(())
}
