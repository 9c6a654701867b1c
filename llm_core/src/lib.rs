//! Client for the streaming answer backend: request encoding, the raw
//! response body and its decoding into text increments.

mod client;
mod decoder;
mod error;
mod request;
mod stream;

pub use client::{AnswerSource, BackendClient, ByteStream};
pub use decoder::Utf8StreamDecoder;
pub use error::StreamError;
pub use request::{ChatRequest, FilePart};
pub use stream::decode_increments;
