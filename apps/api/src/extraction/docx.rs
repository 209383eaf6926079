use std::io::{Cursor, Read};

use anyhow::{anyhow, Context, Result};
use quick_xml::{events::Event, Reader as XmlReader};
use zip::ZipArchive;

/// Largest inflated `word/document.xml` we are willing to hold in memory.
pub const MAX_DOCUMENT_XML_BYTES: u64 = 16 * 1024 * 1024;

/// Reads `word/document.xml` out of a DOCX archive and flattens its runs to text.
/// Paragraphs and explicit breaks become newlines; tabs are preserved.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String> {
    extract_docx_text_with_limit(bytes, MAX_DOCUMENT_XML_BYTES)
}

fn extract_docx_text_with_limit(bytes: &[u8], max_xml_bytes: u64) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("failed to open DOCX archive")?;

    let document = archive
        .by_name("word/document.xml")
        .context("missing word/document.xml")?;

    if document.size() > max_xml_bytes {
        return Err(anyhow!(
            "word/document.xml inflates to {} bytes (limit {max_xml_bytes})",
            document.size()
        ));
    }

    // The header size can lie; never read past the limit regardless.
    let mut xml = String::new();
    document
        .take(max_xml_bytes + 1)
        .read_to_string(&mut xml)
        .context("failed to read DOCX XML")?;
    if xml.len() as u64 > max_xml_bytes {
        return Err(anyhow!("word/document.xml exceeds {max_xml_bytes} bytes"));
    }

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_node = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" | b"w:cr" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e.unescape().map_err(|err| anyhow!(err))?.into_owned();
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(anyhow!("failed to parse DOCX XML: {}", err)),
            _ => {}
        }
        buf.clear();
    }

    Ok(output)
}
