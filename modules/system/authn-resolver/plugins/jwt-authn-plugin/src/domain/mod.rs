pub mod claims;
pub mod client;
pub mod clock;
pub mod codec;
pub mod error;
pub mod service;
