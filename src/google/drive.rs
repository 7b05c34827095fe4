//! Google Drive folder walker and file downloader.
//!
//! Lists a folder tree depth-first with pagination, skipping trashed
//! items and a couple of junk folders, and downloads binary file
//! content with `alt=media`.

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::error::FetchError;
use crate::models::FolderItem;
use crate::staging::sanitize_file_name;

use super::GoogleClient;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
pub const GOOGLE_SHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const GOOGLE_SLIDES_MIME: &str = "application/vnd.google-apps.presentation";

/// Folder names that are never descended into.
const IGNORED_FOLDERS: &[&str] = &["Recycle bin", "__MACOSX"];

const PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    parents: Vec<String>,
}

/// Walk `folder_id` recursively, returning every item in the tree with
/// parents listed before their children. Folder entries are included so
/// callers can report them; files carry the sanitized path of folder
/// names above them in `parent_name`.
pub async fn walk_folder(
    client: &GoogleClient,
    folder_id: &str,
) -> Result<Vec<FolderItem>, FetchError> {
    let mut items = Vec::new();
    walk_into(client, folder_id, "", &mut items).await?;
    Ok(items)
}

fn walk_into<'a>(
    client: &'a GoogleClient,
    folder_id: &'a str,
    parent_name: &'a str,
    items: &'a mut Vec<FolderItem>,
) -> futures::future::BoxFuture<'a, Result<(), FetchError>> {
    Box::pin(async move {
        let children = list_children(client, folder_id).await?;
        for child in children {
            let item = FolderItem {
                id: child.id,
                name: child.name,
                mime_type: child.mime_type,
                size: child.size,
                parent_name: parent_name.to_string(),
                parents: child.parents,
            };
            let is_folder = item.mime_type == FOLDER_MIME;
            let folder_path = if is_folder {
                let clean = sanitize_file_name(&item.name);
                if parent_name.is_empty() {
                    clean
                } else {
                    format!("{}/{}", parent_name, clean)
                }
            } else {
                String::new()
            };
            let id = item.id.clone();
            let name = item.name.clone();
            items.push(item);

            if is_folder && !IGNORED_FOLDERS.contains(&name.as_str()) {
                // One unreadable subfolder should not sink the walk.
                if let Err(err) = walk_into(client, &id, &folder_path, items).await {
                    warn!(folder = %name, error = %err, "skipping unreadable folder");
                }
            }
        }
        Ok(())
    })
}

async fn list_children(
    client: &GoogleClient,
    folder_id: &str,
) -> Result<Vec<DriveFile>, FetchError> {
    let token = client
        .bearer_token()
        .await
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let query = format!("'{}' in parents and trashed=false", folder_id);
    let mut files = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client
            .http()
            .get("https://www.googleapis.com/drive/v3/files")
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", &PAGE_SIZE.to_string()),
                ("fields", "nextPageToken,files(id,name,mimeType,size,parents)"),
            ]);
        if let Some(t) = &page_token {
            request = request.query(&[("pageToken", t.as_str())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let page: FileList = response
            .json()
            .await
            .context("Failed to parse Drive file list")
            .map_err(|e| FetchError::Access(e.to_string()))?;

        files.extend(page.files);
        match page.next_page_token {
            Some(t) => page_token = Some(t),
            None => break,
        }
    }

    Ok(files)
}

/// Download the raw bytes of a binary Drive file.
pub async fn download_file(client: &GoogleClient, id: &str) -> Result<Vec<u8>, FetchError> {
    let token = client
        .bearer_token()
        .await
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let url = format!("https://www.googleapis.com/drive/v3/files/{}?alt=media", id);
    let response = client.http().get(&url).bearer_auth(token).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_status(response.status()));
    }

    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

/// Export a Google-native file (Slides) as plain text.
pub async fn export_file_text(client: &GoogleClient, id: &str) -> Result<String, FetchError> {
    let token = client
        .bearer_token()
        .await
        .map_err(|e| FetchError::Access(e.to_string()))?;

    let url = format!(
        "https://www.googleapis.com/drive/v3/files/{}/export?mimeType=text/plain",
        id
    );
    let response = client.http().get(&url).bearer_auth(token).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_status(response.status()));
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_folder_names_match_exactly() {
        assert!(IGNORED_FOLDERS.contains(&"Recycle bin"));
        assert!(IGNORED_FOLDERS.contains(&"__MACOSX"));
        assert!(!IGNORED_FOLDERS.contains(&"recycle bin"));
        assert!(!IGNORED_FOLDERS.contains(&"Recycle Bin"));
    }

    #[test]
    fn file_list_parses_page_token_and_defaults() {
        let page: FileList = serde_json::from_str(
            r#"{"files":[{"id":"1","name":"a.pdf","mimeType":"application/pdf"}],
                "nextPageToken":"tok"}"#,
        )
        .unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].size, "");
        assert!(page.files[0].parents.is_empty());
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    }
}
