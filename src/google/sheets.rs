//! Google Sheets reader.
//!
//! Fetches a spreadsheet with grid data and renders it to plain text:
//! each sheet contributes its title followed by one line per non-empty
//! row, cells joined with single spaces.

use anyhow::Context;
use serde::Deserialize;

use crate::error::FetchError;

use super::GoogleClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spreadsheet {
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
}

#[derive(Debug)]
pub struct FetchedSheet {
    pub title: String,
    pub text: String,
}

pub async fn fetch_spreadsheet(
    client: &GoogleClient,
    id: &str,
) -> Result<FetchedSheet, FetchError> {
    let token = client
        .bearer_token()
        .await
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let url = format!(
        "https://sheets.googleapis.com/v4/spreadsheets/{}?includeGridData=true",
        id
    );
    let response = client.http().get(&url).bearer_auth(token).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_status(response.status()));
    }

    let spreadsheet: Spreadsheet = response
        .json()
        .await
        .context("Failed to parse Sheets API response")
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let text = render_spreadsheet(&spreadsheet);
    let title = if spreadsheet.properties.title.is_empty() {
        id.to_string()
    } else {
        spreadsheet.properties.title
    };
    Ok(FetchedSheet { title, text })
}

fn render_spreadsheet(spreadsheet: &Spreadsheet) -> String {
    let mut text = String::new();
    for sheet in &spreadsheet.sheets {
        text.push_str(&sheet.properties.title);
        text.push_str(":\n");
        for grid in &sheet.data {
            for row in &grid.row_data {
                let line = row
                    .values
                    .iter()
                    .filter_map(|c| c.formatted_value.as_deref())
                    .collect::<Vec<_>>()
                    .join(" ");
                if line.trim().is_empty() {
                    continue;
                }
                text.push_str(&line);
                text.push('\n');
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Spreadsheet {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sheets_render_title_then_rows() {
        let sheet = parse(
            r#"{"properties":{"title":"Budget"},"sheets":[
                {"properties":{"title":"Q1"},"data":[{"rowData":[
                    {"values":[{"formattedValue":"name"},{"formattedValue":"cost"}]},
                    {"values":[{"formattedValue":"ops"},{"formattedValue":"120"}]}
                ]}]}
            ]}"#,
        );
        assert_eq!(render_spreadsheet(&sheet), "Q1:\nname cost\nops 120\n");
    }

    #[test]
    fn blank_rows_are_skipped() {
        let sheet = parse(
            r#"{"properties":{"title":"S"},"sheets":[
                {"properties":{"title":"Data"},"data":[{"rowData":[
                    {"values":[{"formattedValue":"a"}]},
                    {"values":[{},{}]},
                    {"values":[]},
                    {"values":[{"formattedValue":"b"}]}
                ]}]}
            ]}"#,
        );
        assert_eq!(render_spreadsheet(&sheet), "Data:\na\nb\n");
    }

    #[test]
    fn multiple_sheets_render_in_order() {
        let sheet = parse(
            r#"{"properties":{"title":"S"},"sheets":[
                {"properties":{"title":"One"},"data":[{"rowData":[
                    {"values":[{"formattedValue":"x"}]}
                ]}]},
                {"properties":{"title":"Two"},"data":[]}
            ]}"#,
        );
        assert_eq!(render_spreadsheet(&sheet), "One:\nx\nTwo:\n");
    }
}
