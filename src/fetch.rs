//! Content fetching.
//!
//! Dispatches an added URL to the right fetcher by prefix: Google Doc,
//! Google Sheet, Drive folder, or plain file download. Everything lands
//! in the staging area and comes back as staged file handles.

use tracing::{info, warn};

use std::future::Future;

use crate::error::FetchError;
use crate::google::{docs, drive, sheets, GoogleClient};
use crate::models::{FolderItem, StagedFile};
use crate::staging::{sanitize_file_name, StagingArea};

const DOC_PREFIX: &str = "https://docs.google.com/document/d/";
const SHEET_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";
/// Covers both `.../drive/folders/<id>` and `.../drive/u/<n>/folders/<id>`.
const DRIVE_PREFIX: &str = "https://drive.google.com/drive/";
const FOLDER_SEGMENT: &str = "folders/";

/// Google document ids are at least this long.
const MIN_DOC_ID_LEN: usize = 25;

/// Drive items whose name starts with this prefix are snapshots of a
/// previous ingestion and are never re-ingested.
const SNAPSHOT_PREFIX: &str = "[SNAPSHOT]";

/// Binary mimetypes staged as-is for the extension-based loaders.
const RAW_MIMES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/json",
    "text/xml",
    "application/xml",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
];

/// Mimetypes skipped silently: nothing to index, not an error.
const IGNORED_MIMES: &[&str] = &[
    "application/vnd.google-apps.form",
    "application/vnd.google-apps.site",
    "application/vnd.google-apps.map",
    "application/vnd.google-apps.script",
    "application/vnd.google-apps.drawing",
    "application/vnd.google-apps.jam",
    "application/vnd.google-apps.shortcut",
    "application/vnd.google-apps.drive-sdk",
    "application/zip",
    "application/x-zip-compressed",
];

/// What the folder walk should do with one item.
#[derive(Debug, PartialEq, Eq)]
enum ItemAction {
    Doc,
    Sheet,
    Slides,
    Raw,
    /// Known-uninteresting: skipped without a word.
    Skip,
    /// Unrecognized mimetype: logged, then skipped.
    Unknown,
}

fn item_action(name: &str, mime_type: &str) -> ItemAction {
    if name.starts_with(SNAPSHOT_PREFIX) {
        return ItemAction::Skip;
    }
    if mime_type.starts_with("image/") || mime_type.starts_with("video/") {
        return ItemAction::Skip;
    }
    if IGNORED_MIMES.contains(&mime_type) {
        return ItemAction::Skip;
    }
    match mime_type {
        drive::GOOGLE_DOC_MIME => ItemAction::Doc,
        drive::GOOGLE_SHEET_MIME => ItemAction::Sheet,
        drive::GOOGLE_SLIDES_MIME => ItemAction::Slides,
        m if RAW_MIMES.contains(&m) => ItemAction::Raw,
        _ => ItemAction::Unknown,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UrlKind {
    GoogleDoc(String),
    GoogleSheet(String),
    DriveFolder(String),
    File,
}

/// Classify a URL by prefix and pull out the Google id where one is
/// expected. Anything that is not a Google link is a plain file URL.
pub fn classify_url(url: &str) -> Result<UrlKind, FetchError> {
    if let Some(rest) = url.strip_prefix(DOC_PREFIX) {
        let id = leading_id(rest);
        if id.len() < MIN_DOC_ID_LEN {
            return Err(FetchError::UrlNotRecognized);
        }
        return Ok(UrlKind::GoogleDoc(id));
    }
    if let Some(rest) = url.strip_prefix(SHEET_PREFIX) {
        let id = leading_id(rest);
        if id.len() < MIN_DOC_ID_LEN {
            return Err(FetchError::UrlNotRecognized);
        }
        return Ok(UrlKind::GoogleSheet(id));
    }
    if let Some(rest) = url.strip_prefix(DRIVE_PREFIX) {
        let id = rest
            .find(FOLDER_SEGMENT)
            .map(|at| leading_id(&rest[at + FOLDER_SEGMENT.len()..]))
            .unwrap_or_default();
        if id.is_empty() {
            return Err(FetchError::FolderUrlNotRecognized);
        }
        return Ok(UrlKind::DriveFolder(id));
    }
    Ok(UrlKind::File)
}

fn leading_id(rest: &str) -> String {
    rest.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Partition a folder listing into fetchable items. Folders are
/// structural, skips are silent, unknown mimetypes are logged; `listed`
/// counts every non-folder entry so callers can tell "empty folder"
/// from "nothing ingestable".
fn plan_folder_items(items: Vec<FolderItem>) -> (usize, Vec<(FolderItem, ItemAction)>) {
    let mut listed = 0;
    let mut plan = Vec::new();
    for item in items {
        if item.mime_type == drive::FOLDER_MIME {
            continue;
        }
        listed += 1;
        match item_action(&item.name, &item.mime_type) {
            ItemAction::Skip => {}
            ItemAction::Unknown => {
                info!(item = %item.name, mime = %item.mime_type, "unhandled mimetype, skipping");
            }
            action => plan.push((item, action)),
        }
    }
    (listed, plan)
}

/// Fetch every planned item, tolerating per-item failures. One bad item
/// is logged and skipped; the result is whatever did stage.
async fn stage_plan<F, Fut>(plan: Vec<(FolderItem, ItemAction)>, mut fetch_one: F) -> Vec<StagedFile>
where
    F: FnMut(FolderItem, ItemAction) -> Fut,
    Fut: Future<Output = Result<StagedFile, FetchError>>,
{
    let mut staged = Vec::new();
    for (item, action) in plan {
        let name = item.name.clone();
        match fetch_one(item, action).await {
            Ok(file) => staged.push(file),
            Err(err) => warn!(item = %name, error = %err, "skipping folder item"),
        }
    }
    staged
}

pub struct ContentFetcher<'a> {
    pub google: &'a GoogleClient,
    pub http: &'a reqwest::Client,
    pub staging: &'a StagingArea,
}

impl ContentFetcher<'_> {
    /// Fetch whatever `url` points at into the staging area. A failed
    /// fetch leaves the staging area empty so partial results never
    /// bleed into the next request.
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<StagedFile>, FetchError> {
        let result = self.dispatch_url(url).await;
        if result.is_err() {
            if let Err(err) = self.staging.clear() {
                warn!(error = %err, "staging cleanup after failed fetch");
            }
        }
        result
    }

    async fn dispatch_url(&self, url: &str) -> Result<Vec<StagedFile>, FetchError> {
        match classify_url(url)? {
            UrlKind::GoogleDoc(id) => {
                let doc = docs::fetch_document(self.google, &id).await?;
                let staged = self.stage_text(&doc.title, &id, "", &doc.text)?;
                Ok(vec![staged])
            }
            UrlKind::GoogleSheet(id) => {
                let sheet = sheets::fetch_spreadsheet(self.google, &id).await?;
                let staged = self.stage_text(&sheet.title, &id, "", &sheet.text)?;
                Ok(vec![staged])
            }
            UrlKind::DriveFolder(id) => self.fetch_folder(&id).await,
            UrlKind::File => {
                let staged = self.download_plain_file(url).await?;
                Ok(vec![staged])
            }
        }
    }

    /// Walk a Drive folder and stage every file in it. A single bad
    /// item is logged and skipped; the walk's result is whatever did
    /// stage. An empty walk is not an error, and a non-empty listing
    /// where nothing staged is logged as such.
    async fn fetch_folder(&self, folder_id: &str) -> Result<Vec<StagedFile>, FetchError> {
        let items = drive::walk_folder(self.google, folder_id).await?;
        let (listed, plan) = plan_folder_items(items);
        let staged = stage_plan(plan, |item, action| async move {
            self.fetch_folder_item(&item, action).await
        })
        .await;

        if staged.is_empty() && listed > 0 {
            info!(listed, "folder listing yielded no ingestable files");
        } else {
            info!(listed, staged = staged.len(), "drive folder walked");
        }
        Ok(staged)
    }

    async fn fetch_folder_item(
        &self,
        item: &crate::models::FolderItem,
        action: ItemAction,
    ) -> Result<StagedFile, FetchError> {
        match action {
            ItemAction::Doc => {
                let doc = docs::fetch_document(self.google, &item.id).await?;
                self.stage_text(&item.name, &item.id, &item.parent_name, &doc.text)
            }
            ItemAction::Sheet => {
                let sheet = sheets::fetch_spreadsheet(self.google, &item.id).await?;
                self.stage_text(&item.name, &item.id, &item.parent_name, &sheet.text)
            }
            ItemAction::Slides => {
                let text = drive::export_file_text(self.google, &item.id).await?;
                self.stage_text(&item.name, &item.id, &item.parent_name, &text)
            }
            ItemAction::Raw => {
                let bytes = drive::download_file(self.google, &item.id).await?;
                self.staging
                    .write(&item.name, &item.parent_name, &bytes)
                    .map_err(|e| FetchError::Access(e.to_string()))
            }
            ItemAction::Skip | ItemAction::Unknown => {
                Err(FetchError::Access("item should have been skipped".to_string()))
            }
        }
    }

    async fn download_plain_file(&self, url: &str) -> Result<StagedFile, FetchError> {
        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .map(sanitize_file_name)
            .ok_or(FetchError::UrlNotRecognized)?;

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }
        let bytes = response.bytes().await?;

        self.staging
            .write(&name, "", &bytes)
            .map_err(|e| FetchError::Access(e.to_string()))
    }

    /// Google-native content has no file of its own; rendered text is
    /// staged as a `.txt` named after the document with its id embedded
    /// so same-titled documents never collide.
    fn stage_text(
        &self,
        title: &str,
        id: &str,
        parent: &str,
        text: &str,
    ) -> Result<StagedFile, FetchError> {
        let name = format!("{}__id({}).txt", sanitize_file_name(title), id);
        self.staging
            .write(&name, parent, text.as_bytes())
            .map_err(|e| FetchError::Access(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_ID: &str = "1dRmrPrHK356JymDX4xp8ImQ8zNjSttMJAx0DyEtGGGk";

    #[test]
    fn doc_urls_extract_their_id() {
        let url = format!("{}{}/edit", DOC_PREFIX, DOC_ID);
        assert_eq!(classify_url(&url).unwrap(), UrlKind::GoogleDoc(DOC_ID.to_string()));
    }

    #[test]
    fn sheet_urls_ignore_the_fragment() {
        let url = format!("{}{}/edit#gid=0", SHEET_PREFIX, DOC_ID);
        assert_eq!(
            classify_url(&url).unwrap(),
            UrlKind::GoogleSheet(DOC_ID.to_string())
        );
    }

    #[test]
    fn folder_urls_extract_their_id() {
        let url = "https://drive.google.com/drive/folders/1e_rjH9Y-08V6fDQC6Uui4124fJ2fbAfk";
        assert_eq!(
            classify_url(url).unwrap(),
            UrlKind::DriveFolder("1e_rjH9Y-08V6fDQC6Uui4124fJ2fbAfk".to_string())
        );
    }

    #[test]
    fn short_google_ids_are_rejected() {
        let url = format!("{}short/edit", DOC_PREFIX);
        assert!(matches!(
            classify_url(&url),
            Err(FetchError::UrlNotRecognized)
        ));
    }

    #[test]
    fn account_scoped_folder_urls_are_accepted() {
        let url = "https://drive.google.com/drive/u/0/folders/1e_rjH9Y-08V6fDQC6Uui4124fJ2fbAfk";
        assert_eq!(
            classify_url(url).unwrap(),
            UrlKind::DriveFolder("1e_rjH9Y-08V6fDQC6Uui4124fJ2fbAfk".to_string())
        );
    }

    #[test]
    fn empty_folder_id_is_a_folder_url_error() {
        assert!(matches!(
            classify_url("https://drive.google.com/drive/folders/"),
            Err(FetchError::FolderUrlNotRecognized)
        ));
        assert!(matches!(
            classify_url("https://drive.google.com/drive/my-drive"),
            Err(FetchError::FolderUrlNotRecognized)
        ));
    }

    #[test]
    fn ignored_mimetypes_are_skipped_silently() {
        assert_eq!(item_action("photo.png", "image/png"), ItemAction::Skip);
        assert_eq!(item_action("clip.mov", "video/quicktime"), ItemAction::Skip);
        assert_eq!(
            item_action("form", "application/vnd.google-apps.form"),
            ItemAction::Skip
        );
        assert_eq!(
            item_action("archive.zip", "application/zip"),
            ItemAction::Skip
        );
        assert_eq!(
            item_action("[SNAPSHOT] backup.pdf", "application/pdf"),
            ItemAction::Skip
        );
    }

    #[test]
    fn supported_mimetypes_dispatch_to_their_handler() {
        assert_eq!(item_action("report.pdf", "application/pdf"), ItemAction::Raw);
        assert_eq!(
            item_action("doc", "application/vnd.google-apps.document"),
            ItemAction::Doc
        );
        assert_eq!(
            item_action("sheet", "application/vnd.google-apps.spreadsheet"),
            ItemAction::Sheet
        );
        assert_eq!(
            item_action("deck", "application/vnd.google-apps.presentation"),
            ItemAction::Slides
        );
        assert_eq!(
            item_action("blob.bin", "application/octet-stream"),
            ItemAction::Unknown
        );
    }

    #[test]
    fn other_urls_are_plain_files() {
        assert_eq!(
            classify_url("https://example.com/report.pdf").unwrap(),
            UrlKind::File
        );
    }

    fn folder_item(name: &str, mime_type: &str) -> FolderItem {
        FolderItem {
            id: format!("id-{}", name),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: String::new(),
            parent_name: String::new(),
            parents: Vec::new(),
        }
    }

    #[test]
    fn plan_counts_one_success_for_pdf_plus_ignored() {
        let items = vec![
            folder_item("report.pdf", "application/pdf"),
            folder_item("photo.png", "image/png"),
            folder_item("sub", drive::FOLDER_MIME),
        ];
        let (listed, plan) = plan_folder_items(items);
        assert_eq!(listed, 2);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0.name, "report.pdf");
        assert_eq!(plan[0].1, ItemAction::Raw);
    }

    #[tokio::test]
    async fn one_bad_item_does_not_sink_the_walk() {
        let plan = vec![
            (folder_item("good.pdf", "application/pdf"), ItemAction::Raw),
            (folder_item("bad.pdf", "application/pdf"), ItemAction::Raw),
        ];
        let staged = stage_plan(plan, |item, _| async move {
            if item.name == "bad.pdf" {
                Err(FetchError::PermissionDenied)
            } else {
                Ok(StagedFile {
                    path: std::path::PathBuf::from(&item.name),
                    name: item.name.clone(),
                    extension: "pdf".to_string(),
                    parent_dir: String::new(),
                })
            }
        })
        .await;
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].name, "good.pdf");
    }

    #[tokio::test]
    async fn failed_fetch_clears_the_staging_area() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(tmp.path());
        staging.write("leftover.txt", "", b"x").unwrap();

        let http = reqwest::Client::new();
        let google = GoogleClient::new(
            http.clone(),
            crate::credentials::GoogleServiceAccount {
                client_email: "svc@example.com".to_string(),
                private_key: "not-a-key".to_string(),
            },
        );
        let fetcher = ContentFetcher {
            google: &google,
            http: &http,
            staging: &staging,
        };

        let err = fetcher
            .fetch_url(&format!("{}short", DOC_PREFIX))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UrlNotRecognized));
        assert!(staging.list().unwrap().is_empty());
    }
}
