use bytes::Bytes;
use rand::Rng;

use crate::event::SyntheticEvent;

/// Literal published in place of an event when a fault is injected.
pub const MALFORMED_PAYLOAD: &[u8] = b"this is bad data I can't parse";

/// Default fault-injection odds: one malformed payload per 100,000 calls.
pub const DEFAULT_FAULT_ODDS: u32 = 100_000;

/// What the encoder produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedPayload {
    Event(Bytes),
    Malformed(Bytes),
}

impl EncodedPayload {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Event(b) | Self::Malformed(b) => b,
        }
    }
}

/// Turns synthesized events into publishable bytes, occasionally substituting
/// [`MALFORMED_PAYLOAD`] to exercise consumer error paths.
#[derive(Debug, Clone, Copy)]
pub struct PayloadEncoder {
    fault_odds: u32,
}

impl PayloadEncoder {
    /// Inject a fault with probability `1 / fault_odds`. `0` disables injection.
    pub fn new(fault_odds: u32) -> Self {
        Self { fault_odds }
    }

    /// Encoder that never injects faults.
    pub fn faultless() -> Self {
        Self::new(0)
    }

    pub fn should_inject<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.fault_odds > 0 && rng.random_ratio(1, self.fault_odds)
    }

    /// Encode `event` as JSON, or return the malformed literal.
    ///
    /// A serialization error means the event type no longer serializes and is
    /// treated as fatal by callers.
    pub fn encode<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        event: &SyntheticEvent,
    ) -> serde_json::Result<EncodedPayload> {
        if self.should_inject(rng) {
            return Ok(EncodedPayload::Malformed(Bytes::from_static(MALFORMED_PAYLOAD)));
        }
        serde_json::to_vec(event).map(|v| EncodedPayload::Event(Bytes::from(v)))
    }
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FAULT_ODDS)
    }
}
