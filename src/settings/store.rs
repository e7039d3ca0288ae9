//! Settings persistence on top of a storage backend.
//!
//! The store owns the live in-memory record and reconciles it with flash:
//! `load` adopts a stored record only when its sentinel checks out,
//! `save` writes the whole record atomically with a refreshed sentinel,
//! and a corrupt record is wiped and replaced with factory defaults.
//!
//! The backend is a trait so the same store runs against NVS on the
//! device and against [`MemoryBackend`] in host tests.

use super::config::{factory, DeviceSettings};
use log::{debug, info, warn};
use std::io;

/// Whole-record storage for the settings blob.
///
/// Implementations store exactly one record at a fixed location. Errors
/// use `std::io::Error`; platform backends map their native errors into it.
pub trait SettingsBackend {
    /// Read the stored record, or `None` if nothing has been stored.
    fn read(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the stored record in one write.
    fn write(&mut self, record: &[u8]) -> io::Result<()>;

    /// Remove the stored record entirely.
    fn wipe(&mut self) -> io::Result<()>;
}

/// In-memory backend for host tests and the host stub binary.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    record: Option<Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access to the raw stored record, for corruption tests.
    pub fn record_mut(&mut self) -> Option<&mut Vec<u8>> {
        self.record.as_mut()
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.record.clone())
    }

    fn write(&mut self, record: &[u8]) -> io::Result<()> {
        self.record = Some(record.to_vec());
        Ok(())
    }

    fn wipe(&mut self) -> io::Result<()> {
        self.record = None;
        Ok(())
    }
}

/// The sole manager of persisted device settings.
///
/// Holds the current record in memory; edits stay pending until `save`.
pub struct SettingsStore<B: SettingsBackend> {
    settings: DeviceSettings,
    backend: B,
}

impl<B: SettingsBackend> SettingsStore<B> {
    /// Create a store holding factory defaults. Call [`load`](Self::load)
    /// to pull in whatever is persisted.
    pub fn new(backend: B) -> Self {
        Self {
            settings: DeviceSettings::factory(),
            backend,
        }
    }

    /// The current in-memory record.
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Mutable access for staged edits. Nothing is persisted until
    /// [`save`](Self::save).
    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    /// Replace the whole in-memory record (used by the configuration
    /// endpoint after validating a staged copy).
    pub fn replace(&mut self, settings: DeviceSettings) {
        self.settings = settings;
    }

    /// Load the persisted record.
    ///
    /// Returns true only when a stored record was adopted. An absent
    /// record keeps the in-memory defaults and returns false without
    /// error. A record that fails to decode or whose sentinel does not
    /// match the recomputed hash is treated as corruption: storage is
    /// wiped, factory defaults are restored and persisted, and false is
    /// returned.
    pub fn load(&mut self) -> bool {
        let bytes = match self.backend.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("no settings record in storage, keeping defaults");
                return false;
            }
            Err(e) => {
                warn!("failed to read settings record: {}", e);
                return false;
            }
        };

        let loaded = match DeviceSettings::from_bytes(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("stored settings undecodable ({}), wiping and defaulting", e);
                self.wipe_and_default();
                return false;
            }
        };

        if !loaded.sentinel_matches() {
            warn!("stored settings sentinel invalid, wiping and defaulting");
            self.wipe_and_default();
            return false;
        }

        info!("settings loaded from storage");
        self.settings = loaded;
        true
    }

    /// Persist the current record as one whole-record write.
    ///
    /// The sentinel is recomputed first, so storage never holds a record
    /// with a stale sentinel. The write is read back to confirm the
    /// commit; returns true only when the readback matches.
    pub fn save(&mut self) -> bool {
        self.settings.seal();
        let bytes = self.settings.to_bytes();

        if let Err(e) = self.backend.write(&bytes) {
            warn!("failed to write settings record: {}", e);
            return false;
        }

        // Read back to catch silent flash write failures.
        match self.backend.read() {
            Ok(Some(stored)) if stored == bytes => true,
            Ok(_) => {
                warn!("settings readback mismatch after save");
                false
            }
            Err(e) => {
                warn!("failed to read back settings after save: {}", e);
                false
            }
        }
    }

    /// Reset every field to factory defaults and persist the result.
    pub fn factory_default(&mut self) -> bool {
        self.settings = DeviceSettings::factory();
        self.save()
    }

    /// True iff the current fields hash to the same fingerprint as the
    /// factory defaults — a semantic comparison, not a byte-wise one.
    pub fn is_factory_default(&self) -> bool {
        self.settings.fingerprint() == DeviceSettings::factory().fingerprint()
    }

    /// True only when BOTH the SSID and the network password have been
    /// changed from their factory defaults.
    pub fn is_network_credentials_set(&self) -> bool {
        self.settings.ssid() != factory::SSID && self.settings.password() != factory::PASSWORD
    }

    fn wipe_and_default(&mut self) {
        if let Err(e) = self.backend.wipe() {
            warn!("failed to wipe settings storage: {}", e);
        }
        self.factory_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Load/Save Tests ====================

    #[test]
    fn test_load_empty_storage() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        assert!(!store.load());
        assert!(store.is_factory_default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        store.settings_mut().set_ssid("HomeNet");
        store.settings_mut().set_password("wpa2-secret");
        store.settings_mut().set_owner("Jane");
        store.settings_mut().set_message("Call the neighbors!");
        store.settings_mut().set_recipients("a@x.com;b@y.com");
        store.settings_mut().set_smtp_port(587);
        store.settings_mut().set_panic_level(4);
        assert!(store.save());

        let expected = store.settings().clone();

        // Mutate away from the saved state, then load it back.
        store.settings_mut().set_owner("Somebody Else");
        assert!(store.load());
        assert_eq!(store.settings(), &expected);
    }

    #[test]
    fn test_save_refreshes_sentinel() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        store.settings_mut().set_owner("Jane");
        assert!(!store.settings().sentinel_matches());
        assert!(store.save());
        assert!(store.settings().sentinel_matches());
    }

    // ==================== Corruption Tests ====================

    #[test]
    fn test_corrupt_body_restores_defaults() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        store.settings_mut().set_owner("Jane");
        assert!(store.save());

        // Flip one bit somewhere in the record body.
        {
            let record = store.backend_for_tests().record_mut().unwrap();
            record[4] ^= 0x01;
        }

        assert!(!store.load());
        assert!(store.is_factory_default());
    }

    #[test]
    fn test_corrupt_sentinel_restores_defaults() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        store.settings_mut().set_owner("Jane");
        assert!(store.save());

        // Flip one bit in the stored sentinel itself.
        {
            let record = store.backend_for_tests().record_mut().unwrap();
            let last = record.len() - 1;
            record[last] ^= 0x01;
        }

        assert!(!store.load());
        assert!(store.is_factory_default());
    }

    #[test]
    fn test_undecodable_record_restores_defaults() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        store.backend_for_tests().write(&[0xFF, 0x01]).unwrap();
        assert!(!store.load());
        assert!(store.is_factory_default());
        // The corrupt record was replaced by a valid factory record.
        assert!(store.load());
    }

    // ==================== Factory Default Tests ====================

    #[test]
    fn test_is_factory_default_transitions() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        assert!(store.factory_default());
        assert!(store.is_factory_default());

        store.settings_mut().set_owner("Jane");
        assert!(!store.is_factory_default());

        assert!(store.factory_default());
        assert!(store.is_factory_default());
    }

    #[test]
    fn test_network_credentials_require_both_fields() {
        let mut store = SettingsStore::new(MemoryBackend::new());
        assert!(!store.is_network_credentials_set());

        store.settings_mut().set_ssid("HomeNet");
        assert!(!store.is_network_credentials_set());

        store.settings_mut().set_password("wpa2-secret");
        assert!(store.is_network_credentials_set());

        store.settings_mut().set_ssid(super::super::config::factory::SSID);
        assert!(!store.is_network_credentials_set());
    }
}

#[cfg(test)]
impl SettingsStore<MemoryBackend> {
    fn backend_for_tests(&mut self) -> &mut MemoryBackend {
        &mut self.backend
    }
}
