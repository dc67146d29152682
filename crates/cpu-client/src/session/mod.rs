//! Remote session management

mod connector;
mod outputs;
mod remote;
mod sink;

pub use connector::{ConnectionError, Connector, SessionTarget};
pub use outputs::Outputs;
pub use remote::CpuSession;
pub use sink::{ChannelSink, SinkMessage};
