//! Shared fixtures for unit tests

use crate::error::FetchError;
use crate::transport::Transport;
use crate::types::Event;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

pub(crate) const BASE_URL: &str = "https://theweekinchess.com/twic";

/// Index page with two valid rows and three rejected ones (rows 3, 4, 5)
pub(crate) const SAMPLE_INDEX: &str = r#"<!DOCTYPE html>
<html><head><title>TWIC</title></head><body>
<h1>The Week in Chess</h1>
<table class="results-table">
  <tr><th>TWIC</th><th>Date</th><th>Read</th><th>PGN</th><th>CBV</th><th>Games</th><th>Stories</th></tr>
  <tr>
    <td>1612</td><td>22/09/2025</td>
    <td><a href="/html/twic1612.html">html</a></td>
    <td><a href="/zips/twic1612g.zip">pgn</a></td>
    <td><a href="/zips/twic1612c6.zip">cbv</a></td>
    <td>4589</td><td>12</td>
  </tr>
  <tr>
    <td>TWIC  1611</td><td>15/09/2025</td>
    <td><a href="/html/twic1611.html">html</a></td>
    <td><a href="zips/twic1611g.zip">pgn</a></td>
    <td></td>
    <td>n/a</td><td></td>
  </tr>
  <tr><td>Special</td><td>15/09/2025</td><td></td><td></td><td></td><td>1</td><td>1</td></tr>
  <tr><td>1610</td><td>sometime</td><td></td><td></td><td></td><td>1</td><td>1</td></tr>
  <tr><td>1612</td><td>22/09/2025</td><td></td><td></td><td></td><td>1</td><td>1</td></tr>
  <tr><td colspan="7">Older issues are listed on the archive page</td></tr>
</table>
</body></html>
"#;

/// Scripted transport that counts calls
///
/// Each URL answers from its queue of responses; the last response repeats once the queue
/// is down to one entry. Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
    calls: AtomicUsize,
    calls_by_url: Mutex<HashMap<String, usize>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `body`
    pub(crate) fn respond(&self, url: &str, body: &[u8]) {
        self.respond_sequence(url, vec![Ok(body.to_vec())]);
    }

    /// Answer `url` with the given responses in order
    pub(crate) fn respond_sequence(&self, url: &str, responses: Vec<Result<Vec<u8>, FetchError>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls_by_url
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_url
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Transient server error for `url`
pub(crate) fn server_error(url: &str) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Status {
        url: url.to_string(),
        status: 503,
    })
}

/// Event channel whose receiver is dropped; sends are ignored
pub(crate) fn event_sink() -> broadcast::Sender<Event> {
    broadcast::channel(256).0
}

/// In-memory zip archive containing the given files
pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Single-entry stored zip whose central directory claims `declared` uncompressed bytes
///
/// Sizes that do not fit in 32 bits go into a zip64 extra field, as real large archives do.
pub(crate) fn build_zip_declaring_size(name: &str, data: &[u8], declared: u64) -> Vec<u8> {
    const CENTRAL_HEADER: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
    const END_OF_DIRECTORY: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default());
        writer.start_file(name, options).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
    }
    let mut bytes = cursor.into_inner();

    let header = bytes
        .windows(4)
        .position(|w| w == CENTRAL_HEADER)
        .unwrap();
    let Ok(small) = u32::try_from(declared) else {
        bytes[header + 24..header + 28].copy_from_slice(&u32::MAX.to_le_bytes());
        let name_len = u16::from_le_bytes([bytes[header + 28], bytes[header + 29]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[header + 30], bytes[header + 31]]);
        bytes[header + 30..header + 32].copy_from_slice(&(extra_len + 12).to_le_bytes());

        let mut zip64 = Vec::with_capacity(12);
        zip64.extend_from_slice(&1u16.to_le_bytes());
        zip64.extend_from_slice(&8u16.to_le_bytes());
        zip64.extend_from_slice(&declared.to_le_bytes());
        let at = header + 46 + name_len;
        bytes.splice(at..at, zip64);

        let end = bytes.len() - 22;
        assert_eq!(bytes[end..end + 4], END_OF_DIRECTORY);
        let dir_size = u32::from_le_bytes(bytes[end + 12..end + 16].try_into().unwrap());
        bytes[end + 12..end + 16].copy_from_slice(&(dir_size + 12).to_le_bytes());
        return bytes;
    };
    bytes[header + 24..header + 28].copy_from_slice(&small.to_le_bytes());
    bytes
}
