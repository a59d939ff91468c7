//! Text extraction for the document formats `read_file` understands
//!
//! Spreadsheets and delimited files are rendered as column-aligned tables,
//! one per sheet. PDF and DOCX become plain text with paragraph breaks.

use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{Reader, open_workbook_auto};
use quick_xml::Reader as XmlReader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;

const MAX_TABLE_ROWS: usize = 500;
const DOCX_BODY: &str = "word/document.xml";

/// Document formats with a dedicated extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DocumentKind {
    Pdf,
    Spreadsheet,
    Docx,
    Delimited(u8),
}

impl DocumentKind {
    pub(super) fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Delimited(b',')),
            "tsv" => Some(Self::Delimited(b'\t')),
            _ => None,
        }
    }
}

/// Extract PDF text. pdf-extract is CPU bound; call from a blocking task.
pub(super) fn pdf_text(bytes: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| format!("Failed to read PDF: {}", e))
}

/// Render every sheet of a workbook. Blocking.
pub(super) fn spreadsheet_text(path: &Path) -> Result<String, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("Failed to read spreadsheet: {}", e))?;

    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", name, e))?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        sections.push(format!("Sheet: {}\n{}", name, render_table(&rows)));
    }

    if sections.is_empty() {
        return Err("Spreadsheet has no sheets".to_string());
    }
    Ok(sections.join("\n\n"))
}

/// Paragraph text of a DOCX package
pub(super) fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Failed to open DOCX: {}", e))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| format!("Failed to open DOCX: {}", e))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("Failed to read DOCX: {}", e))?;

    wordml_text(&xml).map_err(|e| format!("Failed to parse DOCX: {}", e))
}

/// Text runs of a WordprocessingML body, one line per paragraph
fn wordml_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = XmlReader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" | b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_text => {
                if let Some(c) = r.resolve_char_ref().ok().flatten() {
                    out.push(c);
                } else if let Some(s) = resolve_predefined_entity(&String::from_utf8_lossy(&r)) {
                    out.push_str(s);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim_end().to_string())
}

/// Render a delimited file as a table; `None` when it does not parse
pub(super) fn delimited_text(bytes: &[u8], delimiter: u8) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()
        .ok()?;
    Some(render_table(&rows))
}

/// Column-aligned table, capped at `MAX_TABLE_ROWS`
fn render_table(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(empty)".to_string();
    }

    let shown = &rows[..rows.len().min(MAX_TABLE_ROWS)];
    let columns = shown.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in shown {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut lines: Vec<String> = shown
        .iter()
        .map(|row| {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect();

    if rows.len() > shown.len() {
        lines.push(format!("... ({} more rows)", rows.len() - shown.len()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(body: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file(DOCX_BODY, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("xls"), Some(DocumentKind::Spreadsheet));
        assert_eq!(DocumentKind::from_extension("tsv"), Some(DocumentKind::Delimited(b'\t')));
        assert_eq!(DocumentKind::from_extension("doc"), None);
        assert_eq!(DocumentKind::from_extension("txt"), None);
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            vec!["name".to_string(), "qty".to_string()],
            vec!["apples".to_string(), "3".to_string()],
            vec!["kiwi".to_string()],
        ];
        assert_eq!(render_table(&rows), "name    qty\napples  3\nkiwi");
        assert_eq!(render_table(&[]), "(empty)");
    }

    #[test]
    fn test_render_table_caps_rows() {
        let rows: Vec<Vec<String>> = (0..MAX_TABLE_ROWS + 7).map(|i| vec![i.to_string()]).collect();
        let out = render_table(&rows);
        assert!(out.ends_with("... (7 more rows)"));
        assert_eq!(out.lines().count(), MAX_TABLE_ROWS + 1);
    }

    #[test]
    fn test_delimited_text() {
        let csv = b"city,population\n\"Paris, FR\",2100000\nOslo,709000\n";
        assert_eq!(
            delimited_text(csv, b',').unwrap(),
            "city       population\nParis, FR  2100000\nOslo       709000"
        );
        assert_eq!(delimited_text(b"a\tb\n1\t2\n", b'\t').unwrap(), "a  b\n1  2");
    }

    #[test]
    fn test_wordml_text() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Sales &amp; Returns</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Q1 </w:t></w:r><w:r><w:tab/><w:t>up &#8364;5</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:instrText>PAGE</w:instrText><w:t>End</w:t></w:r></w:p>
</w:body>
</w:document>"#;
        assert_eq!(wordml_text(xml).unwrap(), "Sales & Returns\nQ1 \tup \u{20ac}5\n\nEnd");
    }

    #[test]
    fn test_docx_text() {
        let body = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p><w:p><w:r><w:t>World</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_text(&docx_bytes(body)).unwrap(), "Hello\nWorld");
    }

    #[test]
    fn test_docx_without_body_is_error() {
        let err = docx_text(b"not a zip").unwrap_err();
        assert!(err.starts_with("Failed to open DOCX"));
    }
}
