//! Upload-path layout (§6 "directories and keys"): `/<account>/uploads/<prefix>/<id>`,
//! where `prefix` is the first `N` hex characters of the upload id. Modern ids
//! encode `N` in their last hex digit so the prefix directory can be recovered
//! from the id alone, without a lookup, by the short-form redirect handlers.
//!
//! `MIN_PREFIX_LEN`/`MAX_PREFIX_LEN` are not pinned to a specific value by the
//! source material; we fix them at `[1, 2]` (decided in DESIGN.md): legacy ids
//! fall back to length 1, and the configured default for new ids is 2.

use quorumgate_common::UploadId;
use uuid::Uuid;

pub const MIN_PREFIX_LEN: usize = 1;
pub const MAX_PREFIX_LEN: usize = 2;
/// Legacy upload ids (predating prefix-length encoding) always use this length.
pub const LEGACY_PREFIX_LEN: usize = 1;

/// Prefix directory length a *new* upload id should encode, derived from the
/// configured default. Clamped into `[MIN_PREFIX_LEN, MAX_PREFIX_LEN]`.
#[must_use]
pub fn configured_prefix_len(default_from_config: u8) -> usize {
    (default_from_config as usize).clamp(MIN_PREFIX_LEN, MAX_PREFIX_LEN)
}

/// Recovers the prefix directory length encoded in `id`'s last hex digit,
/// mapping the nibble's parity onto `{1, 2}` so every id deterministically
/// names exactly one candidate length without a side-table.
#[must_use]
pub fn prefix_len_from_id(id: UploadId) -> usize {
    let nibble = id.last_hex_digit().to_digit(16).unwrap_or(0);
    MIN_PREFIX_LEN + (nibble as usize % (MAX_PREFIX_LEN - MIN_PREFIX_LEN + 1))
}

#[must_use]
pub fn upload_path(account: &str, prefix_len: usize, id: UploadId) -> String {
    let hex = id.to_hex();
    let prefix = &hex[..prefix_len.min(hex.len())];
    format!("/{account}/uploads/{prefix}/{hex}")
}

#[must_use]
pub fn part_path(upload_path: &str, part_number: u32) -> String {
    format!("{upload_path}/{part_number}")
}

/// Generates a fresh upload id whose last hex digit encodes `desired_len`
/// (one of `MIN_PREFIX_LEN`/`MAX_PREFIX_LEN`), so `prefix_len_from_id`
/// recovers it later without a side-table. Flips only the low bit of the
/// last nibble, leaving the rest of the random id untouched.
#[must_use]
pub fn new_upload_id_with_prefix_len(desired_len: usize) -> UploadId {
    let mut bytes = *Uuid::new_v4().as_bytes();
    let wants_odd_nibble = desired_len > MIN_PREFIX_LEN;
    let nibble_is_odd = bytes[15] & 0x01 == 1;
    if nibble_is_odd != wants_odd_nibble {
        bytes[15] ^= 0x01;
    }
    UploadId::from_uuid(Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_prefix_len_from_id_is_deterministic() {
        let id = UploadId::from_uuid(Uuid::parse_str("0123456789abcdef0123456789abcde0").unwrap());
        assert_eq!(prefix_len_from_id(id), 1);
        let id = UploadId::from_uuid(Uuid::parse_str("0123456789abcdef0123456789abcde1").unwrap());
        assert_eq!(prefix_len_from_id(id), 2);
    }

    #[test]
    fn test_upload_path_shape() {
        let id = UploadId::from_uuid(Uuid::parse_str("0123456789abcdef0123456789abcde0").unwrap());
        let path = upload_path("acct", 2, id);
        assert_eq!(path, "/acct/uploads/01/0123456789abcdef0123456789abcde0");
    }

    #[test]
    fn test_new_upload_id_encodes_requested_prefix_len() {
        let short = new_upload_id_with_prefix_len(MIN_PREFIX_LEN);
        assert_eq!(prefix_len_from_id(short), MIN_PREFIX_LEN);
        let long = new_upload_id_with_prefix_len(MAX_PREFIX_LEN);
        assert_eq!(prefix_len_from_id(long), MAX_PREFIX_LEN);
    }
}
