//! Device identity derivation.
//!
//! The device ID is a stable six-character tag derived from the WiFi MAC
//! address with a one-way hash. It namespaces the hostname and the setup
//! access-point SSID so multiple units can coexist.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Derive the six-character device ID from a hardware address.
///
/// Hashes the address string, takes the last six characters of the hex
/// digest, and upper-cases them. Deterministic across reboots for the
/// same hardware address.
pub fn device_id(hardware_address: &str) -> String {
    let digest = Sha256::digest(hardware_address.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex[hex.len() - 6..].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_six_uppercase_hex_chars() {
        let id = device_id("24:0A:C4:12:34:56");
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_id_is_deterministic() {
        let mac = "24:0A:C4:12:34:56";
        assert_eq!(device_id(mac), device_id(mac));
    }

    #[test]
    fn test_different_addresses_differ() {
        assert_ne!(device_id("24:0A:C4:12:34:56"), device_id("24:0A:C4:12:34:57"));
    }
}
