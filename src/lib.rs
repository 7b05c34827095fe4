//! # Docshelf
//!
//! A retrieval-augmented document chat backend.
//!
//! Docshelf ingests documents from uploads, plain URLs, and Google
//! Workspace (Docs, Sheets, whole Drive folders), splits and embeds
//! them into a namespaced vector index, and answers questions over the
//! indexed content with a streaming conversational retrieval chain that
//! survives model context overflows by retrying with fewer documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Fetchers    │──▶│  Pipeline    │──▶│  Vector     │
//! │ Upload/URL/  │   │ Load+Chunk  │   │  Index      │
//! │ Google       │   │ +Embed      │   │ (namespaced)│
//! └──────────────┘   └─────────────┘   └─────┬──────┘
//!                                            │
//!                                      ┌─────▼──────┐
//!                                      │ Chat chain  │
//!                                      │ (SSE, retry)│
//!                                      └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`credentials`] | Tenant credential resolution and namespaces |
//! | [`auth`] | JWT bearer authentication |
//! | [`staging`] | Per-request staging directory |
//! | [`fetch`] | URL dispatch and content fetching |
//! | [`google`] | Docs / Sheets / Drive clients |
//! | [`extract`] | Per-format document loaders |
//! | [`chunk`] | Recursive text splitting |
//! | [`embedding`] | Embedding client |
//! | [`index`] | Vector index client |
//! | [`ingest`] | The load-split-embed-upsert pipeline |
//! | [`llm`] | Chat-completion transport (streaming) |
//! | [`chat`] | Conversational retrieval chain with retry |
//! | [`server`] | HTTP API server (SSE chat) |

pub mod auth;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod credentials;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod google;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod server;
pub mod staging;
