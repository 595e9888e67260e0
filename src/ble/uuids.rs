//! BLE Service and Characteristic UUIDs.
//!
//! Contains all UUID constants used for ZeTime communication.

use uuid::Uuid;

// ZeTime base service
/// ZeTime base service UUID.
pub const BASE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_6006_0000_1000_8000_00805f9b34fb);
/// ZeTime extended service UUID.
pub const EXTEND_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_7006_0000_1000_8000_00805f9b34fb);

/// Data writes from host to watch.
pub const WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_8001_0000_1000_8000_00805f9b34fb);
/// Write acknowledgements from the host; replies from the watch arrive here.
pub const ACK_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000_8002_0000_1000_8000_00805f9b34fb);
/// Host answers to watch-initiated requests.
pub const REPLY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_8003_0000_1000_8000_00805f9b34fb);
/// Unsolicited messages from the watch.
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_8004_0000_1000_8000_00805f9b34fb);
/// Second notification characteristic; nothing is received on it.
pub const TRANSPORT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_8005_0000_1000_8000_00805f9b34fb);

// Heart Rate Service (Standard BLE)
/// Standard BLE Heart Rate Service UUID.
pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180d_0000_1000_8000_00805f9b34fb);
/// Heart Rate Measurement characteristic UUID.
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_00805f9b34fb);

/// Advertised name prefix of ZeTime watches.
pub const ZETIME_NAME_PREFIX: &str = "ZeTime";

/// Check if a service UUID is a ZeTime-specific service.
pub fn is_zetime_service(uuid: &Uuid) -> bool {
    *uuid == BASE_SERVICE_UUID || *uuid == EXTEND_SERVICE_UUID
}

/// Check if an advertised local name looks like a ZeTime.
pub fn is_zetime_name(name: &str) -> bool {
    name.starts_with(ZETIME_NAME_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            WRITE_CHARACTERISTIC_UUID.to_string(),
            "00008001-0000-1000-8000-00805f9b34fb"
        );
        assert!(HEART_RATE_MEASUREMENT_UUID.to_string().contains("2a37"));
    }

    #[test]
    fn test_is_zetime_service() {
        assert!(is_zetime_service(&BASE_SERVICE_UUID));
        assert!(is_zetime_service(&EXTEND_SERVICE_UUID));
        assert!(!is_zetime_service(&HEART_RATE_SERVICE_UUID));
    }

    #[test]
    fn test_is_zetime_name() {
        assert!(is_zetime_name("ZeTime 1234"));
        assert!(!is_zetime_name("Polar H10"));
    }
}
