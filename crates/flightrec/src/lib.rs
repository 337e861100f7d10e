#![deny(clippy::all)]

mod bridge;
pub mod demo;

pub use bridge::Bridge;
pub use bridge::BridgeError;
pub use bridge::RECORDING_EXTENSION;
pub use bridge::UNAVAILABLE_MESSAGE;
