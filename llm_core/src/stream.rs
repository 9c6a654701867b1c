use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::{client::ByteStream, decoder::Utf8StreamDecoder, error::StreamError};

/// Turn a raw body into text increments.
///
/// One decoder lives for the whole body, so characters split across chunks
/// come out whole. Chunks that decode to nothing (only the start of a
/// character) produce no increment.
pub fn decode_increments(mut body: ByteStream) -> impl Stream<Item = Result<String, StreamError>> + Send {
    try_stream! {
        let mut decoder = Utf8StreamDecoder::new();
        while let Some(chunk) = body.next().await {
            let text = decoder.decode(&chunk?);
            if !text.is_empty() {
                yield text;
            }
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            yield tail;
        }
    }
}
