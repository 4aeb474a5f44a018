//! L2: one logical connection to one server — transport, RESP3 handshake,
//! pipelining, and transactions.

mod connection;
mod pipeline;
mod transaction;
mod transport;

pub use connection::{Connection, ConnectionState};
pub use pipeline::Pipeline;
pub use transaction::Transaction;
pub use transport::{Transport, TransportAddr};
