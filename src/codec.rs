//! The payload serialization hook: encoding/decoding policy is a matter for
//! application code, but the crate still exposes the boundary it plugs
//! into. Default is a pass-through byte identity.
//!
//! `send_job_request` encodes outbound job data through this hook, and
//! every inbound `WORK_DATA`/`WORK_WARNING`/`WORK_COMPLETE`/`WORK_EXCEPTION`
//! handler decodes it before storing it on the request.

use std::sync::Arc;

use bytes::Bytes;

/// Encodes/decodes job payloads crossing the client/worker boundary.
/// Implementations must be pure and side-effect free — they run on the
/// single polling task alongside everything else.
pub trait PayloadCodec: Send + Sync {
    /// Called on data handed to the library by application code, just
    /// before it goes out on the wire (job submission data, worker
    /// `WORK_DATA`/`WORK_COMPLETE`/etc payloads).
    fn encode(&self, data: Bytes) -> Bytes {
        data
    }

    /// Called on data arriving from the wire, just before it's handed to
    /// application code (a worker's job data, or a client's result/updates).
    fn decode(&self, data: Bytes) -> Bytes {
        data
    }
}

/// The default codec: wire bytes pass straight through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCodec;

impl PayloadCodec for IdentityCodec {}

/// A fresh `Arc<dyn PayloadCodec>` wrapping [`IdentityCodec`], for
/// constructors that don't take an explicit codec.
pub fn identity() -> Arc<dyn PayloadCodec> {
    Arc::new(IdentityCodec)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;
    impl PayloadCodec for Reverse {
        fn encode(&self, data: Bytes) -> Bytes {
            data.iter().rev().copied().collect::<Vec<u8>>().into()
        }
        fn decode(&self, data: Bytes) -> Bytes {
            self.encode(data)
        }
    }

    #[test]
    fn identity_codec_passes_through() {
        let c = identity();
        let data = Bytes::from_static(b"abc");
        assert_eq!(c.encode(data.clone()), data);
        assert_eq!(c.decode(data.clone()), data);
    }

    #[test]
    fn custom_codec_transforms_both_directions() {
        let c = Reverse;
        assert_eq!(c.encode(Bytes::from_static(b"abc")), Bytes::from_static(b"cba"));
        assert_eq!(c.decode(Bytes::from_static(b"cba")), Bytes::from_static(b"abc"));
    }
}
