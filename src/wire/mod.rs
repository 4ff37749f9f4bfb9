//! The wire codec: framing for both the binary Gearman protocol and the
//! text-mode admin protocol, sharing one connection.

pub mod decoder;
pub mod encoder;
pub mod events;
pub mod protocol;

pub use events::{InboundFrame, OutboundFrame};
pub use protocol::Command;

use tokio_util::codec;

/// The combined decoder/encoder installed on every [`crate::conn::Connection`].
///
/// A `Codec` is per-connection state, not global: the admin handler flips
/// its decoder between binary and text-line modes depending on what it just
/// sent, so each connection needs its own instance.
#[derive(Debug, Default)]
pub struct Codec {
    d: decoder::Decoder,
    e: encoder::Encoder,
}

impl Codec {
    /// Switches the decoder into text-admin mode for the next response.
    pub fn expect_admin(&mut self, terminator: protocol::AdminTerminator) {
        self.d.expect_admin(terminator);
    }
}

impl codec::Decoder for Codec {
    type Item = InboundFrame;
    type Error = decoder::Error;

    fn decode(
        &mut self,
        src: &mut bytes::BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        self.d.decode(src)
    }
}

impl codec::Encoder<OutboundFrame> for Codec {
    type Error = encoder::Error;

    fn encode(
        &mut self,
        item: OutboundFrame,
        dst: &mut bytes::BytesMut,
    ) -> Result<(), Self::Error> {
        self.e.encode(item, dst)
    }
}
