pub mod client;
pub mod error;
pub mod pool;
pub mod types;

pub use client::{Client, QtumRpc, RpcTransport};
pub use error::Error;
pub use pool::{Backend, Pool};
