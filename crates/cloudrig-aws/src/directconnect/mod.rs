//! AWS Direct Connect: hosted connections

pub mod hosted_connection;
pub mod tags;

pub use hosted_connection::DxHostedConnection;
pub use tags::DirectConnectTags;
