//! Websocket session gateway: authenticates each connection once, then relays
//! user turns to the completion service strictly in order.
pub mod gateway_server;
pub mod gateway_ws_protocol;

pub use gateway_server::*;
pub use gateway_ws_protocol::*;
