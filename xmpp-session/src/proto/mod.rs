//! Low-level stream establishment

mod framing;
mod xmpp_codec;
mod xmpp_stream;

pub use xmpp_codec::{Packet, XmppCodec};
pub use xmpp_stream::XmppStream;
pub(crate) use xmpp_stream::stream_error_condition;
