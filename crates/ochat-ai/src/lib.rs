//! ochat-ai: wire layer for the ochat generation proxy
//!
//! Builds the fixed generation request, opens the streaming HTTP call and
//! decodes the newline-delimited JSON body into text fragments.

pub mod client;
pub mod decode;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{DEFAULT_ENDPOINT, StreamClient};
pub use error::{Error, ErrorKind, Result};
pub use stream::{FragmentStream, StreamEvent, fragment_stream};
pub use types::*;
