pub mod address;
pub mod cache;
pub mod config;
pub mod daemon_conf;
pub mod events;
pub mod logging;
pub mod node;
pub mod queries;
pub mod retry;
pub mod rpc;
pub mod subscriptions;
pub mod supervisor;
pub mod test_utils;
pub mod tip;
pub mod zmq;

pub use node::Node;
