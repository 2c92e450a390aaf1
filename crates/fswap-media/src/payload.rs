//! Inline base64 payloads.

use std::path::Path;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use tokio::fs;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::write_atomic;

/// Drop a data-URI header (`data:image/jpeg;base64,`) at the first comma.
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    }
}

/// Decode a base64 payload, with or without a data-URI header.
///
/// Embedded whitespace and missing padding are tolerated. An empty payload
/// is a decode failure.
pub fn decode_base64(payload: &str) -> MediaResult<Vec<u8>> {
    let body: String = strip_data_uri(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(&body)
        .or_else(|_| STANDARD_NO_PAD.decode(body.trim_end_matches('=')))
        .map_err(|_| MediaError::DecodeFailed)?;
    if bytes.is_empty() {
        return Err(MediaError::DecodeFailed);
    }
    Ok(bytes)
}

/// Decode `payload` and write it to `dest`, returning the byte count.
pub async fn decode_to_file(payload: &str, dest: &Path) -> MediaResult<u64> {
    let bytes = decode_base64(payload)?;
    write_atomic(dest, &bytes).await?;
    Ok(bytes.len() as u64)
}

/// Read a file and base64-encode it, returning the text and the raw size.
pub async fn encode_file(path: &Path) -> MediaResult<(String, u64)> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok((STANDARD.encode(&bytes), bytes.len() as u64))
}
