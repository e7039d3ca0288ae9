//! NVS-backed settings storage.
//!
//! Stores the settings blob as a single raw entry so the record is
//! committed as one atomic write.

use super::store::SettingsBackend;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use std::io;

/// NVS namespace for the device settings.
const NVS_NAMESPACE: &str = "panic_btn";

/// NVS key for the settings record.
const NVS_KEY: &str = "settings";

/// Maximum buffer size for the serialized record.
/// String capacities sum to 1397 bytes, the sentinel adds 64, and the
/// length prefixes, port, and flag bytes add 28. Rounded up for margin.
const MAX_RECORD_SIZE: usize = 1536;

/// Settings backend over the default NVS partition.
pub struct NvsBackend {
    nvs: EspNvs<NvsDefault>,
}

impl NvsBackend {
    /// Open (or create) the settings namespace on the given partition.
    ///
    /// The partition handle is shared with the WiFi driver, so the caller
    /// takes it once at boot and clones it here.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl SettingsBackend for NvsBackend {
    fn read(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        match self.nvs.get_raw(NVS_KEY, &mut buf) {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(esp_to_io(e)),
        }
    }

    fn write(&mut self, record: &[u8]) -> io::Result<()> {
        self.nvs.set_raw(NVS_KEY, record).map_err(esp_to_io)?;
        Ok(())
    }

    fn wipe(&mut self) -> io::Result<()> {
        self.nvs.remove(NVS_KEY).map_err(esp_to_io)?;
        Ok(())
    }
}

fn esp_to_io(e: EspError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("NVS error: {:?}", e))
}
