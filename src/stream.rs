use futures_util::{Stream, StreamExt};
use log::{debug, trace};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;

/// Error type for the sample stream. Failures are terminal for the
/// ingestion loop; reconnect policy (none) belongs to the caller.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device answered {status} for {url}")]
    BadStatus { status: StatusCode, url: String },
}

/// Reinterpret a transport chunk as consecutive signed 16-bit
/// little-endian samples.
///
/// Chunk boundaries carry no meaning, and a chunk of odd byte length
/// yields `floor(len/2)` samples: the trailing byte is dropped, not
/// carried into the next chunk. This matches the device's browser
/// client and is a known-lossy policy when the transport splits a
/// sample across chunks.
pub fn decode_chunk(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Streaming client for the device's `/load.bin` endpoint.
#[derive(Debug)]
pub struct LoadStream {
    client: Client,
}

impl LoadStream {
    /// Creates a new `LoadStream` with populated headers and a connect
    /// timeout. There is deliberately no total request timeout: the body
    /// is unbounded.
    pub fn new() -> Self {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/octet-stream"));

        let client = Client::builder()
            .http1_only()
            .connect_timeout(Duration::from_millis(1500))
            .default_headers(headers)
            .build()
            .unwrap(); // Panics if client cannot be built, which is acceptable for client initialization

        LoadStream { client }
    }

    /// Open the stream at `url` and return decoded sample batches, one
    /// per transport chunk, in arrival order. Batches may be empty when
    /// a chunk holds less than one full sample.
    pub async fn open(
        &self,
        url: &str,
    ) -> Result<impl Stream<Item = Result<Vec<i16>, reqwest::Error>>, StreamError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::BadStatus { status, url: url.to_string() });
        }

        debug!("streaming from {}", url);
        Ok(response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| {
                let batch = decode_chunk(&bytes);
                trace!("chunk of {} bytes -> {} samples", bytes.len(), batch.len());
                batch
            })
        }))
    }

    /// Pull the byte stream from `url`, handing every decoded batch to
    /// `on_batch`.
    ///
    /// Returns `Ok(())` when the device closes the stream; returns
    /// `Err(StreamError)` on transport failure. Never retries.
    pub async fn run<F>(&self, url: &str, mut on_batch: F) -> Result<(), StreamError>
    where
        F: FnMut(&[i16]),
    {
        let stream = self.open(url).await?;
        let mut batches = Box::pin(stream);
        while let Some(batch) = batches.next().await {
            on_batch(&batch?);
        }

        // end-of-stream is a silent stop, not an error
        debug!("device closed the stream");
        Ok(())
    }
}

impl Default for LoadStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pairs() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80];
        assert_eq!(decode_chunk(&bytes), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn odd_length_chunk_truncates_trailing_byte() {
        // 5 bytes decode to exactly 2 samples under the truncating policy
        let bytes = [0x10, 0x00, 0x20, 0x00, 0x30];
        assert_eq!(decode_chunk(&bytes), vec![0x10, 0x20]);
    }

    #[test]
    fn empty_and_single_byte_chunks_yield_no_samples() {
        assert!(decode_chunk(&[]).is_empty());
        assert!(decode_chunk(&[0x42]).is_empty());
    }

    #[test]
    fn extremes_survive_decoding() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&i16::MAX.to_le_bytes());
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        bytes.extend_from_slice(&0i16.to_le_bytes());
        assert_eq!(decode_chunk(&bytes), vec![i16::MAX, i16::MIN, 0]);
    }
}
