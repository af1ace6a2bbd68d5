//! Sitemap document decoding
//!
//! Sitemaps arrive either plain or gzip-compressed. Both `<urlset>` and
//! `<sitemapindex>` documents list their targets in `<loc>` elements, so a
//! single strict pass collecting every `<loc>` text serves both.

use crate::{HarvestError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns true when `bytes` start with the gzip magic number
///
/// The transport may already have undone a `Content-Encoding: gzip`, so the
/// payload itself is the only reliable signal.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompresses a gzip payload; plain payloads are returned unchanged
pub fn decode(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    if !is_gzip(bytes) {
        return Ok(bytes.to_vec());
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut xml = Vec::new();
    decoder.read_to_end(&mut xml)?;
    Ok(xml)
}

pub fn compress(xml: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml)?;
    encoder.finish()
}

/// Heuristic for `<loc>` entries that point at further sitemaps
pub fn is_sitemap_link(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("xml") && (lower.contains("sitemap") || lower.contains("site-map"))
}

/// Collects the text of every `<loc>` element, in document order
///
/// Unbalanced tags, a missing root element, or any reader error fail the
/// whole document; `source` names it in the error.
pub fn extract_locs(xml: &[u8], source: &str) -> Result<Vec<String>> {
    let parse_error = |message: String| HarvestError::SitemapParse {
        file: source.to_string(),
        message,
    };

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut locs = Vec::new();
    let mut current = String::new();
    let mut in_loc = false;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                depth += 1;
                saw_root = true;
                if element.local_name().as_ref() == b"loc" {
                    in_loc = true;
                    current.clear();
                }
            }
            Ok(Event::End(element)) => {
                depth = depth.saturating_sub(1);
                if element.local_name().as_ref() == b"loc" {
                    in_loc = false;
                    let loc = current.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
            }
            Ok(Event::Empty(_)) => saw_root = true,
            Ok(Event::Text(text)) if in_loc => {
                let text = text.unescape().map_err(|e| parse_error(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(data)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(parse_error(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if !saw_root {
        return Err(parse_error("no root element".to_string()));
    }
    if depth != 0 {
        return Err(parse_error("unexpected end of document".to_string()));
    }

    Ok(locs)
}
