//! The persisted device settings record.
//!
//! This module contains the platform-independent settings types: field
//! capacities, compiled-in factory defaults, bounded setters, the SHA-256
//! integrity sentinel, and the binary wire format used for flash storage.
//! Everything here can be tested on the host machine.
//!
//! # Example
//!
//! ```
//! use panic_button_esp32::settings::DeviceSettings;
//!
//! let mut settings = DeviceSettings::factory();
//! assert!(settings.set_owner("Jane Doe"));
//! assert!(!settings.set_owner(&"x".repeat(200))); // over capacity, rejected
//! assert_eq!(settings.owner(), "Jane Doe");
//! ```

use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum network password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 63;

/// Maximum admin password length.
pub const MAX_ADMIN_PASSWORD_LEN: usize = 63;

/// Maximum owner name length.
pub const MAX_OWNER_LEN: usize = 100;

/// Maximum alert message body length.
pub const MAX_MESSAGE_LEN: usize = 100;

/// Maximum mail-relay hostname length.
pub const MAX_SMTP_HOST_LEN: usize = 120;

/// Maximum mail-relay username length.
pub const MAX_SMTP_USER_LEN: usize = 120;

/// Maximum mail-relay password length.
pub const MAX_SMTP_PASSWORD_LEN: usize = 120;

/// Maximum sender email address length.
pub const MAX_FROM_EMAIL_LEN: usize = 120;

/// Maximum sender display-name length.
pub const MAX_FROM_NAME_LEN: usize = 50;

/// Maximum recipient-list length (semicolon-delimited addresses).
pub const MAX_RECIPIENTS_LEN: usize = 509;

/// Lowest valid panic level.
pub const PANIC_LEVEL_MIN: u8 = 1;

/// Highest valid panic level.
pub const PANIC_LEVEL_MAX: u8 = 5;

/// Hostname prefix; the device ID is appended.
pub const HOSTNAME_PREFIX: &str = "FNPB-";

/// Setup access-point SSID prefix; the device ID is appended.
pub const AP_SSID_PREFIX: &str = "Panic_Button_";

/// Setup access-point password.
pub const AP_PASSWORD: &str = "P@ssw0rd123";

/// Setup access-point address (also the DHCP gateway handed to clients).
pub const AP_IP: &str = "192.168.1.1";

/// Setup access-point network mask.
pub const AP_NETMASK: &str = "255.255.255.0";

/// Username for the configuration endpoint.
pub const ADMIN_USER: &str = "admin";

/// Factory default values, in record order.
pub mod factory {
    pub const SSID: &str = "SET_ME";
    pub const PASSWORD: &str = "SET_ME";
    pub const ADMIN_PASSWORD: &str = "P@ssw0rd123";
    pub const OWNER: &str = "SET_ME";
    pub const MESSAGE: &str = "Please send help ASAP!";
    pub const SMTP_HOST: &str = "SET_ME";
    pub const SMTP_PORT: u16 = 465;
    pub const SMTP_USER: &str = "SET_ME";
    pub const SMTP_PASSWORD: &str = "SET_ME";
    pub const FROM_EMAIL: &str = "no-reply@panic-button.com";
    pub const FROM_NAME: &str = "FriendlyNeighbor PanicButton";
    pub const RECIPIENTS: &str = "test@email.com";
    pub const IN_PANIC_MODE: bool = false;
    pub const PANIC_LEVEL: u8 = 5;
}

/// The hostname for a given device ID.
pub fn hostname(device_id: &str) -> String {
    format!("{}{}", HOSTNAME_PREFIX, device_id)
}

/// The setup access-point SSID for a given device ID.
pub fn ap_ssid(device_id: &str) -> String {
    format!("{}{}", AP_SSID_PREFIX, device_id)
}

/// The persisted settings record.
///
/// One fixed schema for one device class. String fields are bounded; the
/// setters reject (rather than truncate) values that do not fit. The
/// `sentinel` field holds a hash of all other fields and is refreshed on
/// every save — a mismatch on load means the stored record is corrupt.
///
/// Credential fields live here, so the whole record is zeroized on drop.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DeviceSettings {
    ssid: String,
    password: String,
    admin_password: String,
    owner: String,
    message: String,
    smtp_host: String,
    smtp_port: u16,
    smtp_user: String,
    smtp_password: String,
    from_email: String,
    from_name: String,
    recipients: String,
    in_panic_mode: bool,
    panic_level: u8,
    sentinel: String,
}

impl DeviceSettings {
    /// Build a record holding the compiled-in factory defaults,
    /// sentinel included.
    pub fn factory() -> Self {
        let mut settings = Self {
            ssid: factory::SSID.to_string(),
            password: factory::PASSWORD.to_string(),
            admin_password: factory::ADMIN_PASSWORD.to_string(),
            owner: factory::OWNER.to_string(),
            message: factory::MESSAGE.to_string(),
            smtp_host: factory::SMTP_HOST.to_string(),
            smtp_port: factory::SMTP_PORT,
            smtp_user: factory::SMTP_USER.to_string(),
            smtp_password: factory::SMTP_PASSWORD.to_string(),
            from_email: factory::FROM_EMAIL.to_string(),
            from_name: factory::FROM_NAME.to_string(),
            recipients: factory::RECIPIENTS.to_string(),
            in_panic_mode: factory::IN_PANIC_MODE,
            panic_level: factory::PANIC_LEVEL,
            sentinel: String::new(),
        };
        settings.seal();
        settings
    }

    /// Compute the integrity hash over every field except the sentinel.
    ///
    /// Fields are hashed in declared order; the port and level in decimal,
    /// the panic flag as `true`/`false`. Returns the lowercase hex digest.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ssid.as_bytes());
        hasher.update(self.password.as_bytes());
        hasher.update(self.admin_password.as_bytes());
        hasher.update(self.owner.as_bytes());
        hasher.update(self.message.as_bytes());
        hasher.update(self.smtp_host.as_bytes());
        hasher.update(self.smtp_port.to_string().as_bytes());
        hasher.update(self.smtp_user.as_bytes());
        hasher.update(self.smtp_password.as_bytes());
        hasher.update(self.from_email.as_bytes());
        hasher.update(self.from_name.as_bytes());
        hasher.update(self.recipients.as_bytes());
        hasher.update(if self.in_panic_mode { "true" } else { "false" });
        hasher.update(self.panic_level.to_string().as_bytes());

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// Refresh the sentinel from the current field values.
    pub fn seal(&mut self) {
        self.sentinel = self.fingerprint();
    }

    /// Check the stored sentinel against a freshly computed hash.
    ///
    /// The stored value is never trusted on its own; this is a corruption
    /// detector, not a checksum exposed to callers.
    pub fn sentinel_matches(&self) -> bool {
        self.sentinel == self.fingerprint()
    }

    /// Serialize to the flash record format.
    ///
    /// Format: each string as `[len:2 LE][bytes]` in declared field order,
    /// the port as 2 LE bytes, the panic flag and level as one byte each,
    /// the sentinel string last.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(256);
        put_str(&mut bytes, &self.ssid);
        put_str(&mut bytes, &self.password);
        put_str(&mut bytes, &self.admin_password);
        put_str(&mut bytes, &self.owner);
        put_str(&mut bytes, &self.message);
        put_str(&mut bytes, &self.smtp_host);
        bytes.extend_from_slice(&self.smtp_port.to_le_bytes());
        put_str(&mut bytes, &self.smtp_user);
        put_str(&mut bytes, &self.smtp_password);
        put_str(&mut bytes, &self.from_email);
        put_str(&mut bytes, &self.from_name);
        put_str(&mut bytes, &self.recipients);
        bytes.push(self.in_panic_mode as u8);
        bytes.push(self.panic_level);
        put_str(&mut bytes, &self.sentinel);
        bytes
    }

    /// Deserialize from the flash record format.
    ///
    /// Truncated, over-capacity, or non-UTF-8 content is a decode error;
    /// the caller treats it the same as a sentinel mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SettingsError> {
        let mut reader = Reader::new(bytes);
        let settings = Self {
            ssid: reader.take_str("ssid", MAX_SSID_LEN)?,
            password: reader.take_str("password", MAX_PASSWORD_LEN)?,
            admin_password: reader.take_str("admin_password", MAX_ADMIN_PASSWORD_LEN)?,
            owner: reader.take_str("owner", MAX_OWNER_LEN)?,
            message: reader.take_str("message", MAX_MESSAGE_LEN)?,
            smtp_host: reader.take_str("smtp_host", MAX_SMTP_HOST_LEN)?,
            smtp_port: reader.take_u16()?,
            smtp_user: reader.take_str("smtp_user", MAX_SMTP_USER_LEN)?,
            smtp_password: reader.take_str("smtp_password", MAX_SMTP_PASSWORD_LEN)?,
            from_email: reader.take_str("from_email", MAX_FROM_EMAIL_LEN)?,
            from_name: reader.take_str("from_name", MAX_FROM_NAME_LEN)?,
            recipients: reader.take_str("recipients", MAX_RECIPIENTS_LEN)?,
            in_panic_mode: reader.take_u8()? != 0,
            panic_level: reader.take_u8()?,
            sentinel: reader.take_str("sentinel", 64)?,
        };
        reader.finish()?;
        Ok(settings)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Set the network SSID. Returns false (unchanged) if over capacity.
    pub fn set_ssid(&mut self, value: &str) -> bool {
        set_bounded(&mut self.ssid, value, MAX_SSID_LEN)
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, value: &str) -> bool {
        set_bounded(&mut self.password, value, MAX_PASSWORD_LEN)
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    pub fn set_admin_password(&mut self, value: &str) -> bool {
        set_bounded(&mut self.admin_password, value, MAX_ADMIN_PASSWORD_LEN)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn set_owner(&mut self, value: &str) -> bool {
        set_bounded(&mut self.owner, value, MAX_OWNER_LEN)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, value: &str) -> bool {
        set_bounded(&mut self.message, value, MAX_MESSAGE_LEN)
    }

    pub fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    pub fn set_smtp_host(&mut self, value: &str) -> bool {
        set_bounded(&mut self.smtp_host, value, MAX_SMTP_HOST_LEN)
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    /// Set the mail-relay port. Port zero is rejected.
    pub fn set_smtp_port(&mut self, value: u16) -> bool {
        if value == 0 {
            return false;
        }
        self.smtp_port = value;
        true
    }

    pub fn smtp_user(&self) -> &str {
        &self.smtp_user
    }

    pub fn set_smtp_user(&mut self, value: &str) -> bool {
        set_bounded(&mut self.smtp_user, value, MAX_SMTP_USER_LEN)
    }

    pub fn smtp_password(&self) -> &str {
        &self.smtp_password
    }

    pub fn set_smtp_password(&mut self, value: &str) -> bool {
        set_bounded(&mut self.smtp_password, value, MAX_SMTP_PASSWORD_LEN)
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    pub fn set_from_email(&mut self, value: &str) -> bool {
        set_bounded(&mut self.from_email, value, MAX_FROM_EMAIL_LEN)
    }

    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    pub fn set_from_name(&mut self, value: &str) -> bool {
        set_bounded(&mut self.from_name, value, MAX_FROM_NAME_LEN)
    }

    pub fn recipients(&self) -> &str {
        &self.recipients
    }

    pub fn set_recipients(&mut self, value: &str) -> bool {
        set_bounded(&mut self.recipients, value, MAX_RECIPIENTS_LEN)
    }

    pub fn in_panic_mode(&self) -> bool {
        self.in_panic_mode
    }

    pub fn set_in_panic_mode(&mut self, value: bool) {
        self.in_panic_mode = value;
    }

    pub fn panic_level(&self) -> u8 {
        self.panic_level
    }

    /// Set the panic level. Values outside 1-5 are rejected.
    pub fn set_panic_level(&mut self, value: u8) -> bool {
        if !(PANIC_LEVEL_MIN..=PANIC_LEVEL_MAX).contains(&value) {
            return false;
        }
        self.panic_level = value;
        true
    }
}

/// Bounded assignment shared by the string setters: the capacity is in
/// bytes, and an over-capacity value leaves the field untouched.
fn set_bounded(field: &mut String, value: &str, max: usize) -> bool {
    if value.len() > max {
        return false;
    }
    *field = value.to_string();
    true
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Cursor over a stored record during decoding.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SettingsError> {
        if self.bytes.len() - self.pos < n {
            return Err(SettingsError::InvalidFormat("record truncated".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, SettingsError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, SettingsError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn take_str(&mut self, field: &str, max: usize) -> Result<String, SettingsError> {
        let len = self.take_u16()? as usize;
        if len > max {
            return Err(SettingsError::InvalidFormat(format!(
                "{} length {} exceeds capacity {}",
                field, len, max
            )));
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SettingsError::InvalidFormat(format!("{} is not valid UTF-8", field)))
    }

    fn finish(&self) -> Result<(), SettingsError> {
        if self.pos != self.bytes.len() {
            return Err(SettingsError::InvalidFormat("trailing data".into()));
        }
        Ok(())
    }
}

/// Errors raised while decoding a stored settings record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The stored bytes do not form a valid record.
    InvalidFormat(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(msg) => write!(f, "invalid settings record: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Setter Tests ====================

    #[test]
    fn test_setter_accepts_within_capacity() {
        let mut settings = DeviceSettings::factory();
        assert!(settings.set_ssid("HomeNetwork"));
        assert_eq!(settings.ssid(), "HomeNetwork");
    }

    #[test]
    fn test_setter_accepts_exact_capacity() {
        let mut settings = DeviceSettings::factory();
        let max_ssid = "a".repeat(MAX_SSID_LEN);
        assert!(settings.set_ssid(&max_ssid));
        assert_eq!(settings.ssid(), max_ssid);
    }

    #[test]
    fn test_setter_rejects_over_capacity() {
        let mut settings = DeviceSettings::factory();
        let too_long = "a".repeat(MAX_SSID_LEN + 1);
        assert!(!settings.set_ssid(&too_long));
        // Field is left untouched, not truncated.
        assert_eq!(settings.ssid(), factory::SSID);
    }

    #[test]
    fn test_message_capacity_boundary() {
        let mut settings = DeviceSettings::factory();
        assert!(settings.set_message(&"m".repeat(MAX_MESSAGE_LEN)));
        assert!(!settings.set_message(&"m".repeat(130)));
        assert_eq!(settings.message(), "m".repeat(MAX_MESSAGE_LEN));
    }

    #[test]
    fn test_smtp_port_rejects_zero() {
        let mut settings = DeviceSettings::factory();
        assert!(!settings.set_smtp_port(0));
        assert_eq!(settings.smtp_port(), factory::SMTP_PORT);
        assert!(settings.set_smtp_port(587));
        assert_eq!(settings.smtp_port(), 587);
    }

    #[test]
    fn test_panic_level_range() {
        let mut settings = DeviceSettings::factory();
        assert!(!settings.set_panic_level(0));
        assert!(!settings.set_panic_level(6));
        assert_eq!(settings.panic_level(), factory::PANIC_LEVEL);
        assert!(settings.set_panic_level(1));
        assert_eq!(settings.panic_level(), 1);
    }

    // ==================== Sentinel Tests ====================

    #[test]
    fn test_factory_record_is_sealed() {
        let settings = DeviceSettings::factory();
        assert!(settings.sentinel_matches());
    }

    #[test]
    fn test_mutation_invalidates_sentinel() {
        let mut settings = DeviceSettings::factory();
        settings.set_owner("Someone Else");
        assert!(!settings.sentinel_matches());
        settings.seal();
        assert!(settings.sentinel_matches());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = DeviceSettings::factory();
        let b = DeviceSettings::factory();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_covers_every_field() {
        let base = DeviceSettings::factory().fingerprint();

        let mut s = DeviceSettings::factory();
        s.set_in_panic_mode(true);
        assert_ne!(s.fingerprint(), base);

        let mut s = DeviceSettings::factory();
        s.set_panic_level(2);
        assert_ne!(s.fingerprint(), base);

        let mut s = DeviceSettings::factory();
        s.set_smtp_port(2525);
        assert_ne!(s.fingerprint(), base);
    }

    // ==================== Serialization Tests ====================

    #[test]
    fn test_round_trip() {
        let mut settings = DeviceSettings::factory();
        settings.set_ssid("Net");
        settings.set_password("hunter2hunter2");
        settings.set_recipients("a@x.com;b@y.com");
        settings.set_panic_level(3);
        settings.seal();

        let restored = DeviceSettings::from_bytes(&settings.to_bytes()).unwrap();
        assert_eq!(restored, settings);
        assert!(restored.sentinel_matches());
    }

    #[test]
    fn test_decode_empty() {
        let result = DeviceSettings::from_bytes(&[]);
        assert!(matches!(result, Err(SettingsError::InvalidFormat(_))));
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = DeviceSettings::factory().to_bytes();
        let result = DeviceSettings::from_bytes(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(SettingsError::InvalidFormat(_))));
    }

    #[test]
    fn test_decode_trailing_data() {
        let mut bytes = DeviceSettings::factory().to_bytes();
        bytes.push(0);
        let result = DeviceSettings::from_bytes(&bytes);
        assert!(matches!(result, Err(SettingsError::InvalidFormat(_))));
    }

    #[test]
    fn test_decode_rejects_over_capacity_field() {
        // Claim an SSID longer than its capacity.
        let mut bytes = DeviceSettings::factory().to_bytes();
        bytes[0] = (MAX_SSID_LEN + 1) as u8;
        bytes[1] = 0;
        let result = DeviceSettings::from_bytes(&bytes);
        assert!(matches!(result, Err(SettingsError::InvalidFormat(_))));
    }

    // ==================== Naming Tests ====================

    #[test]
    fn test_hostname_and_ap_ssid() {
        assert_eq!(hostname("A1B2C3"), "FNPB-A1B2C3");
        assert_eq!(ap_ssid("A1B2C3"), "Panic_Button_A1B2C3");
    }
}
