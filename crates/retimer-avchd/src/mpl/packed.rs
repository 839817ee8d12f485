//! Packed-decimal (BCD) fields.
//!
//! Each byte holds two decimal digits, one per nibble: `0x21` is 21 and the
//! two-byte year `0x20 0x21` is 2021.

/// Decode packed-decimal bytes, most significant byte first.
///
/// Returns `None` if any nibble is above 9.
pub fn decode(bytes: &[u8]) -> Option<u32> {
    bytes.iter().try_fold(0u32, |acc, &byte| {
        let high = u32::from(byte >> 4);
        let low = u32::from(byte & 0x0F);
        if high > 9 || low > 9 {
            return None;
        }
        Some(acc * 100 + high * 10 + low)
    })
}

/// Encode a value into `N` packed-decimal bytes.
///
/// Returns `None` if the value needs more than `2 * N` decimal digits.
pub fn encode<const N: usize>(mut value: u32) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    for slot in out.iter_mut().rev() {
        let pair = value % 100;
        value /= 100;
        *slot = (((pair / 10) as u8) << 4) | (pair % 10) as u8;
    }
    (value == 0).then_some(out)
}
