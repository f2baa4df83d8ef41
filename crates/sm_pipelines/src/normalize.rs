//! Slide text extraction, normalization, and the fingerprint used as the
//! text-embedding cache key.

use std::io::Read;

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;

use crate::error::{PipelineError, Result};

const ZERO_WIDTH_SPACE: char = '\u{200b}';

/// Pulls every `<a:t>` DrawingML text run out of one slide's XML, joined by
/// newline in document order.
pub fn extract_text_from_slide_xml(xml_bytes: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut texts = Vec::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            XmlEvent::Start(e) if local_name_is(e.name().as_ref(), b"t") => in_t = true,
            XmlEvent::End(e) if local_name_is(e.name().as_ref(), b"t") => in_t = false,
            XmlEvent::Text(e) if in_t => {
                texts.push(e.unescape()?.into_owned());
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(texts.join("\n"))
}

fn local_name_is(qname: &[u8], local: &[u8]) -> bool {
    match qname.iter().rposition(|&b| b == b':') {
        Some(idx) => &qname[idx + 1..] == local,
        None => qname == local,
    }
}

/// Strips zero-width characters, collapses CRLF/CR to LF, trims and
/// whitespace-collapses each line, and drops blank lines.
pub fn normalize_text(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|&c| c != ZERO_WIDTH_SPACE).collect();
    let unified = stripped.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = unified
        .split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect();

    lines.join("\n")
}

fn collapse_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_was_space = false;
    for c in line.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

/// BLAKE2b, 8-byte digest, hex-encoded: a 16-character fingerprint of
/// normalized text. Empty input fingerprints to the empty string so the
/// embedder can tell "no signature" apart from "normal signature".
pub fn fast_text_sig(norm_text: &str) -> String {
    if norm_text.is_empty() {
        return String::new();
    }
    let mut hasher = Blake2bVar::new(8).expect("8 is a valid blake2b digest size");
    hasher.update(norm_text.as_bytes());
    let mut out = [0u8; 8];
    hasher.finalize_variable(&mut out).expect("fixed 8-byte output buffer");
    hex_encode(&out)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Extracts, normalizes, and fingerprints page `page_no` (1-based) of a
/// `.pptx`, reading `ppt/slides/slide{page_no}.xml` out of the zip.
pub fn extract_page_text(pptx_path: &std::path::Path, page_no: u32) -> Result<(String, String, String)> {
    let file = std::fs::File::open(pptx_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let slide_name = format!("ppt/slides/slide{page_no}.xml");
    let mut entry = archive
        .by_name(&slide_name)
        .map_err(|_| PipelineError::SlideNotFound(slide_name.clone()))?;

    let mut xml = Vec::new();
    entry.read_to_end(&mut xml)?;
    drop(entry);

    let raw = extract_text_from_slide_xml(&xml)?;
    let norm = normalize_text(&raw);
    let sig = fast_text_sig(&norm);
    Ok((raw, norm, sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_zero_width_and_collapses_whitespace() {
        let raw = "Hello\u{200b}   World\r\n\r\n  \n  second   line  ";
        let norm = normalize_text(raw);
        assert_eq!(norm, "Hello World\nsecond line");
    }

    #[test]
    fn empty_text_has_empty_signature() {
        assert_eq!(fast_text_sig(""), "");
    }

    #[test]
    fn signature_is_sixteen_hex_chars() {
        let sig = fast_text_sig("some slide text");
        assert_eq!(sig.len(), 16);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic() {
        assert_eq!(fast_text_sig("repeat me"), fast_text_sig("repeat me"));
        assert_ne!(fast_text_sig("a"), fast_text_sig("b"));
    }

    #[test]
    fn extracts_single_text_run() {
        let xml = br#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
            <a:t>Title</a:t><a:t>Body text</a:t>
        </p:sld>"#;
        let text = extract_text_from_slide_xml(xml).unwrap();
        assert_eq!(text, "Title\nBody text");
    }
}
