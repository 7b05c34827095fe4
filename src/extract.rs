//! Document loaders.
//!
//! Turns a staged file into one or more raw documents based on its
//! extension. PDF yields one document per page, spreadsheets one per
//! sheet, docx one flattened document, CSV one document per record from
//! its `text` column, JSON the strings under its `texts` field, and the
//! remaining text-like formats (txt, md, jsonl, xml) pass through
//! as-is.

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use quick_xml::events::Event;
use std::io::Read;

use crate::error::IngestError;
use crate::models::{ChunkMetadata, RawDocument, StagedFile};

pub fn load(staged: &StagedFile) -> Result<Vec<RawDocument>, IngestError> {
    let result = match staged.extension.as_str() {
        "pdf" => load_pdf(staged),
        "docx" => load_docx(staged),
        "xlsx" | "xls" => load_spreadsheet(staged),
        "csv" => load_csv(staged),
        "json" => load_json(staged),
        "txt" | "md" | "jsonl" | "xml" => load_text(staged),
        other => Err(anyhow::anyhow!("unsupported file type: .{}", other)),
    };
    result.map_err(|e| IngestError::Parse {
        file: staged.name.clone(),
        reason: e.to_string(),
    })
}

fn base_metadata(staged: &StagedFile) -> ChunkMetadata {
    ChunkMetadata {
        source: staged.name.clone(),
        parent_dir: if staged.parent_dir.is_empty() {
            None
        } else {
            Some(staged.parent_dir.clone())
        },
        ..Default::default()
    }
}

fn load_text(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let text = std::fs::read_to_string(&staged.path)
        .with_context(|| format!("Failed to read {}", staged.path.display()))?;
    Ok(vec![RawDocument {
        text,
        metadata: base_metadata(staged),
    }])
}

/// CSV column whose value becomes the document body when present.
const CSV_TEXT_COLUMN: &str = "text";
/// JSON pointer to the field holding indexable strings.
const JSON_TEXTS_POINTER: &str = "/texts";

/// One document per record. When a `text` column exists only that
/// column is indexed, so ids and keys in other columns never reach the
/// embedding; without one the whole row is the body. The header row
/// travels as metadata.
fn load_csv(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let raw = std::fs::read_to_string(&staged.path)
        .with_context(|| format!("Failed to read {}", staged.path.display()))?;
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers = parse_csv_line(header_line);
    let text_column = headers.iter().position(|h| h.trim() == CSV_TEXT_COLUMN);

    let mut documents = Vec::new();
    for line in lines {
        let fields = parse_csv_line(line);
        let text = match text_column {
            Some(column) => fields.get(column).cloned().unwrap_or_default(),
            None => fields.join(","),
        };
        if text.trim().is_empty() {
            continue;
        }
        let mut metadata = base_metadata(staged);
        metadata.csv_headers = Some(headers.join(","));
        documents.push(RawDocument { text, metadata });
    }
    Ok(documents)
}

/// Split one CSV line, honoring double-quoted fields and doubled
/// quote escapes.
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Strings under the `texts` field become one document each; a JSON
/// file without one is indexed as a single text blob.
fn load_json(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let raw = std::fs::read_to_string(&staged.path)
        .with_context(|| format!("Failed to read {}", staged.path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("Invalid JSON")?;

    let texts: Vec<String> = match value.pointer(JSON_TEXTS_POINTER) {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    if texts.is_empty() {
        return Ok(vec![RawDocument {
            text: raw,
            metadata: base_metadata(staged),
        }]);
    }
    Ok(texts
        .into_iter()
        .map(|text| RawDocument {
            text,
            metadata: base_metadata(staged),
        })
        .collect())
}

fn load_pdf(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let bytes = std::fs::read(&staged.path)
        .with_context(|| format!("Failed to read {}", staged.path.display()))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .context("Failed to extract PDF text")?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = base_metadata(staged);
            metadata.page = Some(i + 1);
            RawDocument { text, metadata }
        })
        .collect())
}

fn load_docx(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let file = std::fs::File::open(&staged.path)
        .with_context(|| format!("Failed to open {}", staged.path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("Not a valid docx archive")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("docx missing word/document.xml")?
        .read_to_string(&mut xml)
        .context("Failed to read docx document body")?;

    Ok(vec![RawDocument {
        text: docx_body_text(&xml)?,
        metadata: base_metadata(staged),
    }])
}

/// Pull the visible text out of a WordprocessingML body: `w:t` runs are
/// concatenated, `w:p` ends become newlines, tabs and breaks spaces.
fn docx_body_text(xml: &str) -> anyhow::Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event().context("Malformed docx XML")? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    text.push(' ');
                }
            }
            Event::Text(e) if in_text_run => {
                text.push_str(&e.unescape().context("Bad docx text escape")?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

fn load_spreadsheet(staged: &StagedFile) -> anyhow::Result<Vec<RawDocument>> {
    let mut workbook = open_workbook_auto(&staged.path)
        .with_context(|| format!("Failed to open workbook {}", staged.path.display()))?;

    let mut documents = Vec::new();
    let names = workbook.sheet_names().to_owned();
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet {}", name))?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        documents.push(sheet_document(staged, &name, &rows));
    }
    Ok(documents)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// One document per sheet. The first row is treated as the header: it
/// goes into metadata, not the body, so searching never matches on
/// column names alone.
fn sheet_document(staged: &StagedFile, sheet_name: &str, rows: &[Vec<String>]) -> RawDocument {
    let mut metadata = base_metadata(staged);
    metadata.sheet_name = Some(sheet_name.to_string());

    let mut body = String::new();
    let mut rows_iter = rows.iter();
    if let Some(header) = rows_iter.next() {
        metadata.csv_headers = Some(header.join(","));
    }
    for row in rows_iter {
        let line = row.join(",");
        if line.trim_matches(',').trim().is_empty() {
            continue;
        }
        body.push_str(&line);
        body.push('\n');
    }

    RawDocument {
        text: body,
        metadata,
    }
}
