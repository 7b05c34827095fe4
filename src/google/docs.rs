//! Google Docs reader.
//!
//! Fetches a document by id and flattens its structural tree to plain
//! text: paragraph runs in order, table cells row-major, and table of
//! contents entries recursively.

use anyhow::Context;
use serde::Deserialize;

use crate::error::FetchError;

use super::GoogleClient;

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    title: String,
    body: Body,
}

#[derive(Debug, Deserialize, Default)]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StructuralElement {
    paragraph: Option<Paragraph>,
    table: Option<Table>,
    table_of_contents: Option<TableOfContents>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    elements: Vec<ParagraphElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphElement {
    text_run: Option<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    #[serde(default)]
    table_rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    #[serde(default)]
    table_cells: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
struct TableOfContents {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

/// A fetched document: its title (used for the staged file name) and
/// the flattened body text.
#[derive(Debug)]
pub struct FetchedDoc {
    pub title: String,
    pub text: String,
}

pub async fn fetch_document(client: &GoogleClient, id: &str) -> Result<FetchedDoc, FetchError> {
    let token = client
        .bearer_token()
        .await
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let url = format!("https://docs.googleapis.com/v1/documents/{}", id);
    let response = client.http().get(&url).bearer_auth(token).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_status(response.status()));
    }

    let document: Document = response
        .json()
        .await
        .context("Failed to parse Docs API response")
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let text = flatten_elements(&document.body.content);
    let title = if document.title.is_empty() {
        id.to_string()
    } else {
        document.title
    };
    Ok(FetchedDoc { title, text })
}

/// Flatten structural elements depth-first. Run contents keep their own
/// trailing newlines; table cells are separated by single spaces.
fn flatten_elements(elements: &[StructuralElement]) -> String {
    let mut text = String::new();
    for element in elements {
        if let Some(paragraph) = &element.paragraph {
            for run in &paragraph.elements {
                if let Some(text_run) = &run.text_run {
                    text.push_str(&text_run.content);
                }
            }
        } else if let Some(table) = &element.table {
            for row in &table.table_rows {
                for cell in &row.table_cells {
                    text.push_str(&flatten_elements(&cell.content));
                    text.push(' ');
                }
                text.push('\n');
            }
        } else if let Some(toc) = &element.table_of_contents {
            text.push_str(&flatten_elements(&toc.content));
        }
    }
    text
}
