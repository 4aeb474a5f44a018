//! L1: RESP3 wire protocol — framing, command encoding, and decoding.

pub mod codec;
pub mod command;
pub mod hashers;
pub mod types;

pub use codec::{CommandEncoder, Resp3Decoder};
pub use command::{cmd0, cmd1, cmd2, cmd3, Argument, Command, IntoArgument};
pub use hashers::key_slot;
pub use types::{ClusterHash, ClusterRouting, RespVersion};
