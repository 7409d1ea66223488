//! Reading request bytes and writing response JSON.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::envelope::Response;

/// Read the raw request from `path`, or from stdin when `path` is `None` or `-`.
///
/// Bytes are returned undecoded; encoding errors surface as a protocol error
/// response when the request is parsed, not as a host failure.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read(path).with_context(|| format!("read request {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("read request from stdin")?;
            Ok(buf)
        }
    }
}

/// Write `response` as one line of compact JSON.
pub fn write_response<W: Write>(mut out: W, response: &Response) -> Result<()> {
    serde_json::to_writer(&mut out, response).context("serialize response json")?;
    out.write_all(b"\n").context("write response")?;
    out.flush().context("flush response")?;
    Ok(())
}
