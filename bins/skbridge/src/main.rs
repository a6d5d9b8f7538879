use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skbridge_core::{
    discover_devices, AccessoryId, BridgeConfig, BusPath, CharacteristicValue, DeviceDescriptor,
};
use skbridge_http::{HttpClient, HttpError};
use skbridge_sync::{CharacteristicHandle, CharacteristicWriter, ReconnectSupervisor, SyncHandle};

/// Stand-in accessory backend: logs every characteristic update. A real
/// frontend implements [`CharacteristicWriter`] against its accessory
/// API instead.
struct LogWriter;

impl CharacteristicWriter for LogWriter {
    fn write(&self, handle: CharacteristicHandle, value: CharacteristicValue) {
        tracing::info!(
            owner = %handle.owner,
            characteristic = ?handle.characteristic,
            ?value,
            "characteristic update"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,skbridge_sync=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = BridgeConfig::load(std::path::Path::new(&config_path))
        .with_context(|| format!("loading configuration from {config_path}"))?;

    tracing::info!(host = %config.host, "bridge starting");

    let http = HttpClient::new(&config);
    let (supervisor, handle) = ReconnectSupervisor::new(&config, Arc::new(LogWriter));

    let mut sync_task = tokio::spawn(supervisor.run());
    let discovery_task = tokio::spawn(run_discovery(http, handle.clone(), config.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
            handle.shutdown().await;
            let _ = (&mut sync_task).await;
        }
        _ = &mut sync_task => {
            tracing::warn!("sync loop stopped");
        }
    }

    discovery_task.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Bus path probed to decide whether a device is still present: the
/// path feeding its first characteristic.
fn probe_path(device: &DeviceDescriptor, config: &BridgeConfig) -> BusPath {
    device
        .kind
        .bindings(config)
        .first()
        .and_then(|binding| binding.suffix)
        .map(|suffix| device.path.join(suffix))
        .unwrap_or_else(|| device.path.clone())
}

/// Periodic device discovery: fetch the full tree, wire devices not
/// seen before. When `removeDevicesNotPresent` is set, devices whose
/// paths answer 404 are unwired; otherwise a vanished device stops
/// producing updates but keeps its accessory.
async fn run_discovery(http: HttpClient, handle: SyncHandle, config: BridgeConfig) {
    // Give the upstream time to assemble its API tree
    tokio::time::sleep(Duration::from_secs(config.initialize_delay_secs)).await;

    let mut known: HashMap<AccessoryId, BusPath> = HashMap::new();
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.rediscovery_interval_secs));

    loop {
        interval.tick().await;

        let tree = match http.full_tree().await {
            Ok(tree) => tree,
            Err(e) => {
                tracing::warn!(error = %e, "discovery fetch failed");
                continue;
            }
        };

        for device in discover_devices(&tree, &config) {
            if !known.contains_key(&device.id) {
                tracing::info!(
                    name = %device.display_name,
                    path = %device.path,
                    "discovered device"
                );
                known.insert(device.id, probe_path(&device, &config));
                handle.add_accessory(&device, &config).await;
            }
        }

        if config.remove_devices_not_present {
            sweep_absent(&http, &handle, &mut known).await;
        }
    }
}

/// Drop accessories whose bus paths have vanished upstream. Only a
/// definite 404 removes a device; transport and auth failures keep it.
async fn sweep_absent(
    http: &HttpClient,
    handle: &SyncHandle,
    known: &mut HashMap<AccessoryId, BusPath>,
) {
    let mut absent = Vec::new();
    for (id, path) in known.iter() {
        match http.check_path(path).await {
            Err(HttpError::NotPresent) => absent.push(*id),
            Ok(()) => {}
            Err(e) => tracing::debug!(%path, error = %e, "presence probe inconclusive"),
        }
    }

    for id in absent {
        if let Some(path) = known.remove(&id) {
            tracing::info!(%path, "device no longer present, removing accessory");
            handle.remove_accessory(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skbridge_core::DeviceKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn switch(identifier: &str, path: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            id: AccessoryId::from_identifier(identifier),
            identifier: identifier.to_string(),
            display_name: identifier.to_string(),
            path: BusPath::new(path),
            category: BusPath::new("electrical.switches"),
            manufacturer: "Test".to_string(),
            model: "Test".to_string(),
            serial_number: identifier.to_string(),
            kind: DeviceKind::Switch,
        }
    }

    /// Answer one HTTP request per status, then stop.
    async fn serve_statuses(listener: TcpListener, statuses: Vec<&'static str>) {
        for status in statuses {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
        }
    }

    #[test]
    fn test_probe_path_uses_first_binding_suffix() {
        let config = BridgeConfig::default();
        let device = switch("sw", "electrical.switches.sw");
        assert_eq!(
            probe_path(&device, &config),
            BusPath::new("electrical.switches.sw.state")
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_devices_answering_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(serve_statuses(listener, vec!["404 Not Found"]));

        let config = BridgeConfig {
            host: addr.to_string(),
            ..Default::default()
        };
        let http = HttpClient::new(&config);
        let (_supervisor, handle) = ReconnectSupervisor::new(&config, Arc::new(LogWriter));

        let device = switch("sw", "electrical.switches.sw");
        handle.add_accessory(&device, &config).await;
        assert!(!handle.registry().read().unwrap().is_empty());

        let mut known = HashMap::from([(device.id, probe_path(&device, &config))]);
        sweep_absent(&http, &handle, &mut known).await;

        assert!(known.is_empty());
        assert!(handle.registry().read().unwrap().is_empty());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_sweep_keeps_devices_on_transport_errors() {
        // Nothing listens here; the probe fails without a 404
        let config = BridgeConfig {
            host: "127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let http = HttpClient::new(&config);
        let (_supervisor, handle) = ReconnectSupervisor::new(&config, Arc::new(LogWriter));

        let device = switch("sw", "electrical.switches.sw");
        handle.add_accessory(&device, &config).await;

        let mut known = HashMap::from([(device.id, probe_path(&device, &config))]);
        sweep_absent(&http, &handle, &mut known).await;

        assert_eq!(known.len(), 1);
        assert!(!handle.registry().read().unwrap().is_empty());
    }
}
