//! Utility functions for the zetime-rust-ble crate.

use chrono::NaiveDateTime;

/// Cut a string to at most `max_bytes` bytes without splitting a character.
///
/// # Example
///
/// ```
/// use zetime_rust_ble::truncate_utf8;
///
/// assert_eq!(truncate_utf8("héllo", 2), "h");
/// assert_eq!(truncate_utf8("héllo", 3), "hé");
/// ```
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Render a local time as the 15 ASCII bytes `YYYYMMDDTHHMMSS`.
///
/// Years outside `0..=9999` are clamped so the field width stays fixed.
pub fn ascii_timestamp(time: &NaiveDateTime) -> [u8; 15] {
    use chrono::{Datelike, Timelike};

    let year = time.year().clamp(0, 9999) as u32;
    let fields = [
        (year, 4),
        (time.month(), 2),
        (time.day(), 2),
        (time.hour(), 2),
        (time.minute(), 2),
        (time.second().min(59), 2),
    ];

    let mut out = [b'0'; 15];
    let mut pos = 0;
    for (i, (value, width)) in fields.iter().enumerate() {
        if i == 3 {
            out[pos] = b'T';
            pos += 1;
        }
        let mut value = *value;
        for offset in (0..*width).rev() {
            out[pos + offset] = b'0' + (value % 10) as u8;
            value /= 10;
        }
        pos += width;
    }
    out
}

/// Round a Celsius temperature into a signed byte.
///
/// # Example
///
/// ```
/// use zetime_rust_ble::celsius_to_i8;
///
/// assert_eq!(celsius_to_i8(21.6), 22);
/// assert_eq!(celsius_to_i8(-300.0), -128);
/// ```
#[inline]
pub fn celsius_to_i8(celsius: f32) -> i8 {
    celsius.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        assert_eq!(truncate_utf8("日本", 4), "日");
        assert_eq!(truncate_utf8("日本", 0), "");
    }

    #[test]
    fn test_ascii_timestamp() {
        let time = NaiveDate::from_ymd_opt(2018, 6, 8)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(&ascii_timestamp(&time), b"20180608T090503");
    }

    #[test]
    fn test_celsius_to_i8() {
        assert_eq!(celsius_to_i8(0.0), 0);
        assert_eq!(celsius_to_i8(-4.4), -4);
        assert_eq!(celsius_to_i8(200.0), 127);
    }
}
