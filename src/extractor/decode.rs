//! Byte decoding for supported document formats
//!
//! Handling is determined by file extension: plain text and markdown decode
//! directly, Word documents decode to concatenated paragraphs, PDFs to
//! concatenated pages. Everything else is unsupported.

use std::io::Read;
use std::path::Path;

use crate::extractor::error::ExtractError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Decode raw document bytes into plain text
pub fn decode_bytes(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("txt") | Some("md") => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Some("docx") => decode_docx(bytes),
        Some("pdf") => decode_pdf(bytes),
        other => Err(ExtractError::Unsupported(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

fn decode_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Decode(e.to_string()))
}

fn decode_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Decode(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Decode(format!("word/document.xml: {}", e)))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Decode(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Decode(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraph_text(&doc_xml)
}

/// Collect `w:t` text runs, joining paragraphs with newlines
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Decode(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            writer
                .start_file(
                    "word/document.xml",
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_decode_plain_text_and_markdown() {
        assert_eq!(decode_bytes(b"hello", "incident.txt").unwrap(), "hello");
        assert_eq!(decode_bytes(b"# RCA", "incident.md").unwrap(), "# RCA");
        // Extension casing does not matter
        assert_eq!(decode_bytes(b"hello", "incident.TXT").unwrap(), "hello");
    }

    #[test]
    fn test_unsupported_extension_is_distinct() {
        let err = decode_bytes(b"...", "incident.xlsx").unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));

        let err = decode_bytes(b"...", "incident").unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn test_invalid_zip_returns_decode_error_for_docx() {
        let err = decode_bytes(b"not a zip", "incident.docx").unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn test_invalid_pdf_returns_decode_error() {
        let err = decode_bytes(b"not a pdf", "incident.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn test_docx_paragraphs_join_with_newlines() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Database timed out</w:t></w:r></w:p>
                <w:p><w:r><w:t>Pool was exhausted</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let text = decode_bytes(&docx_bytes(xml), "incident.docx").unwrap();
        assert_eq!(text.trim(), "Database timed out\nPool was exhausted");
    }
}
