//! Slide-size-driven aspect classification, read from `ppt/presentation.xml`.

use std::io::Read;

use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader;
use sm_protocol::Aspect;

const RATIO_4_3: f64 = 4.0 / 3.0;
const RATIO_16_9: f64 = 16.0 / 9.0;
const TOLERANCE_4_3: f64 = 0.08;
const TOLERANCE_16_9: f64 = 0.12;

/// Reads `p:sldSz@cx`/`@cy` and buckets the ratio into a tolerance band.
/// Any failure (missing entry, unparsable XML, non-positive dimensions)
/// degrades to `Aspect::Unknown` rather than propagating an error — aspect
/// detection is best-effort geometry, not a required artifact.
pub fn detect_aspect_from_pptx(pptx_path: &std::path::Path) -> Aspect {
    detect_aspect_inner(pptx_path).unwrap_or(Aspect::Unknown)
}

fn detect_aspect_inner(pptx_path: &std::path::Path) -> Option<Aspect> {
    let file = std::fs::File::open(pptx_path).ok()?;
    let mut archive = zip::ZipArchive::new(file).ok()?;
    let mut entry = archive.by_name("ppt/presentation.xml").ok()?;
    let mut xml = Vec::new();
    entry.read_to_end(&mut xml).ok()?;
    drop(entry);

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            XmlEvent::Empty(e) | XmlEvent::Start(e) if local_name_is(e.name().as_ref(), b"sldSz") => {
                return aspect_from_attrs(&e);
            }
            XmlEvent::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn aspect_from_attrs(e: &BytesStart) -> Option<Aspect> {
    let mut cx: Option<f64> = None;
    let mut cy: Option<f64> = None;
    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        let local = key.rsplit(|&b| b == b':').next().unwrap_or(key);
        let value = std::str::from_utf8(attr.value.as_ref()).ok()?;
        match local {
            b"cx" => cx = value.parse().ok(),
            b"cy" => cy = value.parse().ok(),
            _ => {}
        }
    }
    classify(cx?, cy?)
}

fn classify(cx: f64, cy: f64) -> Option<Aspect> {
    if cx <= 0.0 || cy <= 0.0 {
        return Some(Aspect::Unknown);
    }
    let ratio = cx / cy;
    if (ratio - RATIO_4_3).abs() < TOLERANCE_4_3 {
        return Some(Aspect::Ratio4x3);
    }
    if (ratio - RATIO_16_9).abs() < TOLERANCE_16_9 {
        return Some(Aspect::Ratio16x9);
    }
    Some(Aspect::Unknown)
}

fn local_name_is(qname: &[u8], local: &[u8]) -> bool {
    match qname.iter().rposition(|&b| b == b':') {
        Some(idx) => &qname[idx + 1..] == local,
        None => qname == local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_standard_ratios() {
        assert_eq!(classify(9_144_000.0, 6_858_000.0), Some(Aspect::Ratio4x3));
        assert_eq!(classify(12_192_000.0, 6_858_000.0), Some(Aspect::Ratio16x9));
        assert_eq!(classify(1.0, 1.0), Some(Aspect::Unknown));
    }

    #[test]
    fn non_positive_dims_are_unknown() {
        assert_eq!(classify(0.0, 100.0), Some(Aspect::Unknown));
        assert_eq!(classify(100.0, 0.0), Some(Aspect::Unknown));
    }
}
