use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use motion_watch_common::frame::Frame;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{now_ms, CaptureError, CaptureSource};

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace` MJPEG bodies.
///
/// Chunks may cut anywhere, including through a boundary marker.
pub struct MultipartParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MultipartParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed a chunk and return every JPEG it completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep a tail in case the boundary spans chunks.
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    else {
                        // Skip already-scanned bytes next time.
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        break;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before the boundary.
                    let end = if jpeg_end >= 2 && &self.buffer[jpeg_end - 2..jpeg_end] == b"\r\n" {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                    if !jpeg.is_empty() {
                        parts.push(jpeg);
                    }
                    self.state = ParseState::SeekingHeaderEnd;
                }
            }
        }

        parts
    }
}

impl Default for MultipartParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Frames from an HTTP MJPEG stream. Connects on the first request and
/// does not reconnect: a dropped stream exhausts the source.
pub struct MjpegSource {
    url: String,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    parser: MultipartParser,
    pending: VecDeque<Vec<u8>>,
    seq: u64,
    finished: bool,
}

impl MjpegSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            stream: None,
            parser: MultipartParser::new(),
            pending: VecDeque::new(),
            seq: 0,
            finished: false,
        }
    }

    async fn connect(&self) -> Result<BoxStream<'static, reqwest::Result<Bytes>>, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CaptureError::HttpConnect)?;
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::HttpConnect)?;

        if !response.status().is_success() {
            return Err(CaptureError::HttpStatus(response.status().as_u16()));
        }

        info!(url = self.url, status = %response.status(), "connected to MJPEG stream");
        Ok(response.bytes_stream().boxed())
    }

    async fn next_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        loop {
            if let Some(jpeg) = self.pending.pop_front() {
                return Ok(jpeg);
            }
            if self.stream.is_none() {
                self.stream = Some(self.connect().await?);
            }
            let Some(stream) = self.stream.as_mut() else {
                return Err(CaptureError::EndOfStream);
            };
            match stream.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.parser.push(&chunk)),
                Some(Err(e)) => return Err(CaptureError::HttpStream(e)),
                None => {
                    debug!(frames = self.seq, "MJPEG stream ended");
                    return Err(CaptureError::EndOfStream);
                }
            }
        }
    }
}

impl CaptureSource for MjpegSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.finished {
            return Err(CaptureError::EndOfStream);
        }
        let jpeg = match self.next_jpeg().await {
            Ok(jpeg) => jpeg,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        let seq = self.seq;
        self.seq += 1;
        Frame::decode(&jpeg, now_ms(), seq).map_err(|e| {
            warn!(error = %e, seq, bytes = jpeg.len(), "undecodable MJPEG part");
            self.finished = true;
            CaptureError::Frame(e)
        })
    }

    async fn release(&mut self) {
        self.finished = true;
        if self.stream.take().is_some() {
            debug!(url = self.url, frames = self.seq, "MJPEG connection closed");
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(BOUNDARY);
        out.extend_from_slice(b"Content-Type: image/jpeg\r\n");
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn splits_complete_parts() {
        let mut body = part(b"\xFF\xD8first\xFF\xD9");
        body.extend(part(b"\xFF\xD8second\xFF\xD9"));
        body.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        let parts = parser.push(&body);
        assert_eq!(
            parts,
            vec![b"\xFF\xD8first\xFF\xD9".to_vec(), b"\xFF\xD8second\xFF\xD9".to_vec()]
        );
    }

    #[test]
    fn part_is_held_until_next_boundary() {
        let mut parser = MultipartParser::new();
        assert!(parser.push(&part(b"jpeg-bytes")).is_empty());
        assert_eq!(parser.push(BOUNDARY), vec![b"jpeg-bytes".to_vec()]);
    }

    #[test]
    fn boundary_split_across_chunks() {
        let mut body = b"preamble".to_vec();
        body.extend(part(b"one"));
        body.extend(part(b"two"));
        body.extend_from_slice(BOUNDARY);

        // Feed three bytes at a time so every marker gets cut.
        let mut parser = MultipartParser::new();
        let mut parts = Vec::new();
        for chunk in body.chunks(3) {
            parts.extend(parser.push(chunk));
        }
        assert_eq!(parts, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn find_subsequence_positions() {
        assert_eq!(find_subsequence(b"abc--frame\r\n", BOUNDARY), Some(3));
        assert_eq!(find_subsequence(b"--fram", BOUNDARY), None);
    }
}
