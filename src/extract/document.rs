// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Partitioners for text, DOCX and spreadsheet files

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::{Element, ElementKind, Partitioner};
use crate::{DocsortError, Result};

/// Plain text and lightweight markup; one element per blank-line block
pub struct PlainTextPartitioner;

impl PlainTextPartitioner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner for PlainTextPartitioner {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown", "rst", "adoc", "asciidoc"]
    }

    fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let bytes = std::fs::read(path)?;
        Ok(split_paragraphs(&String::from_utf8_lossy(&bytes)))
    }
}

fn split_paragraphs(content: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                elements.push(Element::text(ElementKind::Paragraph, block.join("\n")));
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    elements
}

/// Word documents; one element per `w:p` paragraph
pub struct DocxPartitioner;

impl DocxPartitioner {
    pub fn new() -> Self {
        Self
    }

    fn document_xml(path: &Path) -> Result<String> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| DocsortError::Extraction(format!("Failed to open DOCX: {}", e)))?;

        // DOCX stores content in word/document.xml
        let mut document_xml = archive
            .by_name("word/document.xml")
            .map_err(|_| DocsortError::Extraction("No document.xml found".to_string()))?;

        let mut content = String::new();
        document_xml.read_to_string(&mut content)?;
        Ok(content)
    }
}

impl Default for DocxPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner for DocxPartitioner {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }

    fn priority(&self) -> u8 {
        60
    }

    fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let xml = Self::document_xml(path)?;
        parse_docx_paragraphs(&xml)
    }
}

fn parse_docx_paragraphs(xml: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(xml);
    let mut elements = Vec::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        elements.push(Element::text(ElementKind::Paragraph, text));
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => paragraph.push('\t'),
                b"w:br" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocsortError::Extraction(format!("Bad DOCX text: {}", e)))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocsortError::Extraction(format!(
                    "Malformed DOCX XML at {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(elements)
}

/// Spreadsheets; sheet names as titles, one element per non-empty row
pub struct SpreadsheetPartitioner;

impl SpreadsheetPartitioner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner for SpreadsheetPartitioner {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["xlsx", "xlsm", "xls", "ods"]
    }

    fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        use calamine::{open_workbook_auto, Reader};

        info!("Extracting spreadsheet: {:?}", path);

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| DocsortError::Extraction(format!("Failed to open spreadsheet: {}", e)))?;

        let mut elements = Vec::new();
        for sheet_name in workbook.sheet_names() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::debug!("Skipping sheet {}: {}", sheet_name, e);
                    continue;
                }
            };

            elements.push(Element::text(ElementKind::Title, sheet_name.clone()));
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
                if cells.iter().any(|c| !c.trim().is_empty()) {
                    elements.push(Element::text(ElementKind::TableRow, cells.join("\t")));
                }
            }
        }

        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{join_elements, TextExtractor};
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_plain_text_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Heading\n\nFirst line\nsecond line\n\n\n  \nLast").unwrap();

        let elements = PlainTextPartitioner::new().partition(&path).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[1].content(), Some("First line\nsecond line"));
        assert_eq!(join_elements(&elements), "# Heading\nFirst line\nsecond line\nLast");
    }

    #[test]
    fn test_plain_text_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9 au lait").unwrap();

        let text = TextExtractor::new().extract(&path);
        assert!(text.starts_with("caf"));
        assert!(text.ends_with("au lait"));
    }

    #[test]
    fn test_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");

        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hydrodynamique </w:t></w:r><w:r><w:t xml:space="preserve">g&#233;n&#233;ralis&#233;e</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t>Second</w:t><w:tab/><w:t>paragraph</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();

        let elements = DocxPartitioner::new().partition(&path).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].content(), Some("Hydrodynamique généralisée"));
        assert_eq!(elements[1].content(), Some("Second\tparagraph"));
    }

    #[test]
    fn test_docx_without_document_xml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default()).unwrap();
        zip.finish().unwrap();

        assert!(DocxPartitioner::new().partition(&path).is_err());
        assert_eq!(TextExtractor::new().extract(&path), "");
    }

    #[test]
    fn test_spreadsheet_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.xlsx");

        let workbook = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Scores" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;
        let sheet = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>GGE</t></is></c><c r="B1"><v>0.6</v></c></row>
    <row r="3"><c r="A3" t="inlineStr"><is><t>GHD</t></is></c><c r="B3"><v>0.35</v></c></row>
  </sheetData>
</worksheet>"#;
        let content_types = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

        write_zip(
            &path,
            &[
                ("[Content_Types].xml", content_types),
                ("xl/workbook.xml", workbook),
                ("xl/_rels/workbook.xml.rels", rels),
                ("xl/worksheets/sheet1.xml", sheet),
            ],
        );

        let elements = SpreadsheetPartitioner::new().partition(&path).unwrap();
        assert_eq!(
            elements,
            vec![
                Element::text(ElementKind::Title, "Scores"),
                Element::text(ElementKind::TableRow, "GGE\t0.6"),
                Element::text(ElementKind::TableRow, "GHD\t0.35"),
            ]
        );
    }

    #[test]
    fn test_corrupt_spreadsheet_gives_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"PK\x03\x04 truncated workbook").unwrap();

        assert!(SpreadsheetPartitioner::new().partition(&path).is_err());
        assert_eq!(TextExtractor::new().extract(&path), "");
    }
}
