//! Command codec for the receiver's line protocol.
//!
//! - [`encode`]: semantic intents to command text
//! - [`decode`]: status lines to typed, zone-routed deltas
//! - [`line_codec`]: CR framing with telnet option refusal

pub mod decode;
pub mod encode;
pub mod line_codec;
pub mod types;

pub use decode::decode_line;
pub use encode::{plan_relative_volume, RelativeVolume, VolumeCommand};
pub use line_codec::{InboundFrame, LineCodec, OutboundFrame};
pub use types::{DecodedLine, DynamicVolume, Source, StatusUpdate, UnknownToken, Zone};
