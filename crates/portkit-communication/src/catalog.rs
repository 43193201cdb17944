//! Device catalog: serial device enumeration with short-lived caching.
//!
//! The full enumeration path queries the platform device registry and
//! extracts a port name plus 4-hex-digit vendor/product identifiers from
//! each entry's descriptive text. When the query fails, or matches
//! nothing, the catalog degrades to a basic name-only listing from the
//! runtime's serial subsystem so the caller always gets a usable list.
//!
//! Results are memoized for two seconds to avoid hammering the hardware
//! from UI refresh loops.

use parking_lot::Mutex;
use portkit_core::{CatalogError, EventBus, PortEvent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// How long one enumeration pass stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(2);

/// Default vendor/product identifier when extraction finds nothing.
const UNKNOWN_ID: &str = "0000";

fn com_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\(COM(\d+)\)").expect("valid regex"))
}

fn vid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)VID_([0-9A-Fa-f]{4})").expect("valid regex"))
}

fn pid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)PID_([0-9A-Fa-f]{4})").expect("valid regex"))
}

/// Metadata record for one discoverable serial device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Platform-visible port identifier (e.g. "COM3").
    pub port_name: String,
    /// Human-readable device label.
    pub display_name: String,
    /// 4-hex-digit USB vendor id, "0000" when unextractable.
    pub vendor_id: String,
    /// 4-hex-digit USB product id, "0000" when unextractable.
    pub product_id: String,
    /// Raw platform device path, opaque.
    pub device_id: String,
    /// Raw identifier strings used as extraction fallback.
    pub hardware_ids: Vec<String>,
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.port_name, self.display_name)
    }
}

impl DeviceDescriptor {
    /// Build a name-only descriptor with defaulted identifiers
    fn basic(port_name: impl Into<String>) -> Self {
        let port_name = port_name.into();
        Self {
            display_name: port_name.clone(),
            port_name,
            vendor_id: UNKNOWN_ID.to_string(),
            product_id: UNKNOWN_ID.to_string(),
            device_id: String::new(),
            hardware_ids: Vec::new(),
        }
    }
}

/// One raw entry from the platform device registry
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Raw device path (e.g. `USB\VID_1A86&PID_7523\5&2F3A...`).
    pub device_id: String,
    /// Descriptive text, expected to carry a "(COMn)" token.
    pub description: String,
    /// Ordered hardware identifier strings.
    pub hardware_ids: Vec<String>,
}

/// Source of raw device entries
///
/// Production uses [`SystemRegistry`]; tests inject fakes to exercise the
/// extraction and fallback paths without hardware.
pub trait DeviceRegistry: Send + Sync {
    /// Query the platform registry for serial-class device entries
    fn query(&self) -> Result<Vec<RegistryEntry>, CatalogError>;

    /// Basic enumeration: just the port names the serial subsystem knows
    fn port_names(&self) -> Vec<String>;
}

/// Registry backed by the system serial subsystem
///
/// Builds registry entries from `serialport::available_ports()`,
/// synthesizing the conventional `USB\VID_xxxx&PID_xxxx` identifier text
/// from USB port info so the extraction path behaves the same on every
/// platform.
#[derive(Debug, Default)]
pub struct SystemRegistry;

impl SystemRegistry {
    fn describe(port: &serialport::SerialPortInfo) -> String {
        let label = match &port.port_type {
            serialport::SerialPortType::UsbPort(usb_info) => format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            ),
            serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
            serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
            _ => "Serial Port".to_string(),
        };
        format!("{} ({})", label, port.port_name)
    }
}

impl DeviceRegistry for SystemRegistry {
    fn query(&self) -> Result<Vec<RegistryEntry>, CatalogError> {
        let ports =
            serialport::available_ports().map_err(|e| CatalogError::EnumerationFailure {
                reason: e.to_string(),
            })?;

        let entries = ports
            .iter()
            .map(|port| match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let id_text = format!("USB\\VID_{:04X}&PID_{:04X}", usb_info.vid, usb_info.pid);
                    RegistryEntry {
                        device_id: match &usb_info.serial_number {
                            Some(serial) => format!("{}\\{}", id_text, serial),
                            None => id_text.clone(),
                        },
                        description: Self::describe(port),
                        hardware_ids: vec![id_text],
                    }
                }
                _ => RegistryEntry {
                    device_id: port.port_name.clone(),
                    description: Self::describe(port),
                    hardware_ids: Vec::new(),
                },
            })
            .collect();

        Ok(entries)
    }

    fn port_names(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                tracing::warn!("Basic port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Extract "COM<digits>" from an entry description, if present
fn extract_port_name(description: &str) -> Option<String> {
    com_token_pattern()
        .captures(description)
        .map(|caps| format!("COM{}", &caps[1]))
}

/// Extract a (vid, pid) pair from one identifier string
///
/// Both patterns must match for the pair to be accepted.
fn extract_ids_from(id: &str) -> Option<(String, String)> {
    let vid = vid_pattern().captures(id)?;
    let pid = pid_pattern().captures(id)?;
    Some((vid[1].to_uppercase(), pid[1].to_uppercase()))
}

/// Extract vendor/product ids, preferring the device path over hardware ids
fn extract_ids(device_id: &str, hardware_ids: &[String]) -> (String, String) {
    if let Some(pair) = extract_ids_from(device_id) {
        return pair;
    }
    for hardware_id in hardware_ids {
        if let Some(pair) = extract_ids_from(hardware_id) {
            return pair;
        }
    }
    (UNKNOWN_ID.to_string(), UNKNOWN_ID.to_string())
}

struct CachedScan {
    entries: Vec<DeviceDescriptor>,
    captured_at: Instant,
}

/// Enumerates candidate serial devices and caches the result briefly
///
/// `list_devices` never fails the caller: enumeration errors are reported
/// via the event bus and answered with a degraded name-only listing.
pub struct DeviceCatalog {
    registry: Box<dyn DeviceRegistry>,
    events: Arc<EventBus>,
    cache: Mutex<Option<CachedScan>>,
    ttl: Duration,
}

impl DeviceCatalog {
    /// Create a catalog backed by the system serial subsystem
    pub fn new(events: Arc<EventBus>) -> Self {
        Self::with_registry(events, Box::new(SystemRegistry))
    }

    /// Create a catalog with a custom registry source
    pub fn with_registry(events: Arc<EventBus>, registry: Box<dyn DeviceRegistry>) -> Self {
        Self {
            registry,
            events,
            cache: Mutex::new(None),
            ttl: CACHE_TTL,
        }
    }

    /// Override the cache expiration
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// List discoverable serial devices
    ///
    /// Returns the cached scan when it is younger than the expiration,
    /// otherwise re-enumerates. The returned vector is a defensive copy;
    /// mutating it does not affect the cache.
    pub fn list_devices(&self) -> Vec<DeviceDescriptor> {
        let mut cache = self.cache.lock();

        if let Some(cached) = cache.as_ref() {
            if cached.captured_at.elapsed() < self.ttl && !cached.entries.is_empty() {
                return cached.entries.clone();
            }
        }

        let entries = self.scan();
        *cache = Some(CachedScan {
            entries: entries.clone(),
            captured_at: Instant::now(),
        });
        entries
    }

    /// Drop any cached scan so the next listing re-enumerates
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    fn scan(&self) -> Vec<DeviceDescriptor> {
        match self.registry.query() {
            Ok(raw_entries) => {
                let devices: Vec<DeviceDescriptor> = raw_entries
                    .into_iter()
                    .filter_map(|entry| {
                        let port_name = extract_port_name(&entry.description)?;
                        let (vendor_id, product_id) =
                            extract_ids(&entry.device_id, &entry.hardware_ids);
                        Some(DeviceDescriptor {
                            port_name,
                            display_name: entry.description,
                            vendor_id,
                            product_id,
                            device_id: entry.device_id,
                            hardware_ids: entry.hardware_ids,
                        })
                    })
                    .collect();

                if devices.is_empty() {
                    self.basic_scan()
                } else {
                    devices
                }
            }
            Err(e) => {
                tracing::error!("Device enumeration failed, using basic listing: {}", e);
                self.events
                    .publish(PortEvent::error("EnumerationFailure", e.to_string()));
                self.basic_scan()
            }
        }
    }

    fn basic_scan(&self) -> Vec<DeviceDescriptor> {
        self.registry
            .port_names()
            .into_iter()
            .map(DeviceDescriptor::basic)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portkit_core::{EventChannel, EventFilter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRegistry {
        entries: Result<Vec<RegistryEntry>, CatalogError>,
        names: Vec<String>,
        query_count: Arc<AtomicUsize>,
    }

    impl DeviceRegistry for FakeRegistry {
        fn query(&self) -> Result<Vec<RegistryEntry>, CatalogError> {
            self.query_count.fetch_add(1, Ordering::SeqCst);
            self.entries.clone()
        }

        fn port_names(&self) -> Vec<String> {
            self.names.clone()
        }
    }

    fn usb_entry() -> RegistryEntry {
        RegistryEntry {
            device_id: "USB\\VID_1A86&PID_7523\\5&2F3A9B01&0&2".to_string(),
            description: "USB-SERIAL CH340 (COM5)".to_string(),
            hardware_ids: vec!["USB\\VID_1A86&PID_7523".to_string()],
        }
    }

    fn catalog_with(
        entries: Result<Vec<RegistryEntry>, CatalogError>,
        names: Vec<String>,
    ) -> (DeviceCatalog, Arc<EventBus>, Arc<AtomicUsize>) {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let registry = FakeRegistry {
            entries,
            names,
            query_count: count.clone(),
        };
        let catalog = DeviceCatalog::with_registry(bus.clone(), Box::new(registry));
        (catalog, bus, count)
    }

    #[test]
    fn test_extract_port_name() {
        assert_eq!(
            extract_port_name("USB-SERIAL CH340 (COM5)"),
            Some("COM5".to_string())
        );
        // Case-insensitive token match.
        assert_eq!(
            extract_port_name("Prolific (com12)"),
            Some("COM12".to_string())
        );
        assert_eq!(extract_port_name("Bluetooth Device"), None);
    }

    #[test]
    fn test_extract_ids_prefers_device_path() {
        let (vid, pid) = extract_ids(
            "USB\\VID_1a86&PID_7523\\serial",
            &["USB\\VID_FFFF&PID_FFFF".to_string()],
        );
        assert_eq!(vid, "1A86");
        assert_eq!(pid, "7523");
    }

    #[test]
    fn test_extract_ids_hardware_fallback() {
        let (vid, pid) = extract_ids(
            "ACPI\\PNP0501\\1",
            &[
                "no match here".to_string(),
                "USB\\VID_0403&PID_6001".to_string(),
            ],
        );
        assert_eq!(vid, "0403");
        assert_eq!(pid, "6001");
    }

    #[test]
    fn test_extract_ids_defaults() {
        let (vid, pid) = extract_ids("ACPI\\PNP0501\\1", &[]);
        assert_eq!(vid, "0000");
        assert_eq!(pid, "0000");
    }

    #[test]
    fn test_full_enumeration() {
        let (catalog, _bus, _count) = catalog_with(Ok(vec![usb_entry()]), vec![]);

        let devices = catalog.list_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].port_name, "COM5");
        assert_eq!(devices[0].vendor_id, "1A86");
        assert_eq!(devices[0].product_id, "7523");
        assert_eq!(devices[0].to_string(), "COM5 (USB-SERIAL CH340 (COM5))");
    }

    #[test]
    fn test_entries_without_com_token_are_skipped() {
        let mut entry = usb_entry();
        entry.description = "USB Composite Device".to_string();
        let (catalog, _bus, _count) =
            catalog_with(Ok(vec![entry]), vec!["COM1".to_string()]);

        // Zero matches falls back to the basic listing.
        let devices = catalog.list_devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].port_name, "COM1");
        assert_eq!(devices[0].vendor_id, "0000");
    }

    #[test]
    fn test_query_failure_falls_back_and_reports() {
        let error_count = Arc::new(AtomicUsize::new(0));
        let (catalog, bus, _count) = catalog_with(
            Err(CatalogError::EnumerationFailure {
                reason: "registry unavailable".to_string(),
            }),
            vec!["COM1".to_string(), "COM2".to_string()],
        );

        let ec = error_count.clone();
        bus.subscribe(EventFilter::Channels(vec![EventChannel::Error]), move |_| {
            ec.fetch_add(1, Ordering::SeqCst);
        });

        let devices = catalog.list_devices();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.vendor_id == "0000"));
        assert_eq!(error_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_hit_returns_distinct_copies() {
        let (catalog, _bus, count) = catalog_with(Ok(vec![usb_entry()]), vec![]);

        let mut first = catalog.list_devices();
        let second = catalog.list_devices();

        assert_eq!(first, second);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Mutating the caller's copy must not leak into the cache.
        first[0].port_name = "COM99".to_string();
        let third = catalog.list_devices();
        assert_eq!(third[0].port_name, "COM5");
    }

    #[test]
    fn test_cache_expiration_triggers_rescan() {
        let (catalog, _bus, count) = catalog_with(Ok(vec![usb_entry()]), vec![]);
        let catalog = catalog.with_cache_ttl(Duration::from_millis(10));

        catalog.list_devices();
        std::thread::sleep(Duration::from_millis(25));
        catalog.list_devices();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_rescan() {
        let (catalog, _bus, count) = catalog_with(Ok(vec![usb_entry()]), vec![]);

        catalog.list_devices();
        catalog.invalidate();
        catalog.list_devices();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
