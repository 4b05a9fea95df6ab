//! Content-hash utilities for the replica fan-out and commit coordinator.
//!
//! The wire digest is MD5, base64-encoded — this is the one place in the
//! core that must match the real algorithm bit-for-bit (clients compare
//! `Computed-MD5` against their own hash), so this uses the `md-5` crate
//! rather than any placeholder.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// The digest of a zero-byte payload. Zero-byte PUTs and commits short-circuit
/// to this constant instead of running MD5 over an empty buffer.
pub const ZERO_BYTE_DIGEST: &str = "1B2M2Y8AsgTpgAmY7PhCfg==";

/// Base64-encoded MD5 of `data`, in one shot.
#[must_use]
pub fn digest(data: &[u8]) -> String {
    encode_digest(md5::compute(data).0)
}

#[must_use]
pub fn encode_digest(raw: [u8; 16]) -> String {
    BASE64.encode(raw)
}

/// Streaming MD5 accumulator for the replica fan-out: fed one chunk at a
/// time as the request body is piped to every replica, so the digest is
/// ready the instant the body ends without re-reading it.
#[derive(Default)]
pub struct DigestCalculator {
    ctx: md5::Context,
}

impl DigestCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.ctx.consume(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> String {
        encode_digest(self.ctx.compute().0)
    }
}
