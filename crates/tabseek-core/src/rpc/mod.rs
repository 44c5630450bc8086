//! Cross-context message protocol.
//!
//! Content contexts talk to the background only through JSON payloads; the background
//! pushes commands back the same way. Requests are a closed set of tagged variants, and a
//! request the background does not recognize gets no response at all.

mod bus;
mod protocol;

pub use bus::{ContentEndpoint, ContentRouter, Envelope, RpcClient};
pub use protocol::{
    BackgroundRequest, BackgroundResponse, ContentCommand, ShortcutCommand, TabRef,
    decode_content_command, decode_request,
};
