//! Core data models used throughout docshelf.
//!
//! These types represent the staged files, document chunks, and chat
//! artifacts that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file fetched from any source and materialized in the staging area.
///
/// Created by the content fetcher, consumed by the document loader, and
/// gone once the staging area is cleared at the end of the request.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Absolute path inside the staging directory.
    pub path: PathBuf,
    /// Sanitized file name (no directory components).
    pub name: String,
    /// Lowercased extension without the dot (e.g. `"pdf"`).
    pub extension: String,
    /// Label of the source folder this file came from, if any
    /// (e.g. a Drive subfolder path). Empty for top-level items.
    pub parent_dir: String,
}

/// Metadata attached to every [`DocumentChunk`] and carried through to
/// chat source citations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Source label shown to the user (staged file name, or a cleaned-up
    /// path for folder items).
    pub source: String,
    /// Parent folder label for items fetched from a folder tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_dir: Option<String>,
    /// Header row of the originating spreadsheet sheet, comma-joined.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "CSV_Headers"
    )]
    pub csv_headers: Option<String>,
    /// Name of the originating spreadsheet sheet.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sheetName")]
    pub sheet_name: Option<String>,
    /// 1-based page number for paged formats (PDF).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

/// A parsed text unit produced by a loader, before splitting.
///
/// A single staged file may yield several raw documents (one per PDF
/// page, one per spreadsheet sheet).
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A bounded-length slice of source text ready for embedding.
///
/// Owned exclusively by the embedding step until upserted into the
/// vector index; order within a source document is preserved.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// An entry discovered while walking a Drive folder tree.
///
/// Transient: produced by the recursive folder lister, consumed by the
/// per-mimetype dispatcher, never persisted.
#[derive(Debug, Clone)]
pub struct FolderItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: String,
    /// Sanitized path of parent folder names, joined with `/`.
    pub parent_name: String,
    pub parents: Vec<String>,
}

/// A cited source returned with a chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "pageContent")]
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// The final product of one successful chain invocation.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// One chat request: the question, prior turns, and tuning knobs.
///
/// Constructed once per chat call and treated as immutable thereafter.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    /// Prior turns as ordered `[question, answer]` pairs.
    #[serde(default)]
    pub history: Vec<(String, String)>,
    pub model: String,
    pub algo: String,
    /// How many chunks to retrieve; the server default applies when
    /// the client omits it.
    #[serde(default, rename = "documentCount")]
    pub document_count: i64,
    /// Request-scoped personal key overrides; never persisted.
    #[serde(default, rename = "openAiKey")]
    pub openai_key: String,
    #[serde(default, rename = "anthropicKey")]
    pub anthropic_key: String,
}

/// Current chunk count for a namespace, plus the fixed display ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStatus {
    pub size: u64,
    pub max: u64,
}
