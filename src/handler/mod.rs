//! Protocol round handlers.
//!
//! [`owner`] consumes one owner ServiceInfo message (SET_OSI) and updates
//! the session; [`device`] produces exactly one device ServiceInfo message
//! (GET_DSI) under the MTU budget. Both are plain functions over the
//! session, the codec contexts and the collaborators, so every branch can
//! be driven directly from tests.

pub mod device;
pub mod owner;

pub use device::{produce, DeviceMessage};
pub use owner::process;
