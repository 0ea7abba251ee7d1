//! # Album Press
//!
//! An authoring store for photo albums that compiles each album into a
//! browsable website and an EPUB 3 e-book. An album is a tree of small XML
//! documents on disk; derived pages are regenerated only when their sources
//! change.
//!
//! # Architecture: Store → Pages → Package
//!
//! ```text
//! albums.xml ─┐
//! album.xml  ─┼─ store ──> model ──> pages ──> EPUB/*.xhtml   (website folder)
//! chapter.xml ┘                  └─> manifest ──> content.opf, toc.ncx
//!                                          └─> package ──> .epub / .zip
//! ```
//!
//! - **Lazy loading**: the registry lists album headers only. Album and
//!   chapter bodies are parsed on demand, so listing a hundred albums reads
//!   one file.
//! - **Incremental builds**: every derived file is checked against its
//!   sources by modification time (see [`stale`]), so a rebuild after editing
//!   one chapter rewrites that chapter's pages and nothing else.
//! - **Safe publishing**: documents and archives are written to a temp file
//!   beside the target and moved over it only when complete.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | In-memory album tree with per-entity dirty flags |
//! | [`store`] | XML documents on disk: parse, sparse write, album/chapter lifecycle |
//! | [`stale`] | Effective-time comparison deciding whether a derived file is stale |
//! | [`naming`] | Escaping, safe file names and every derived path |
//! | [`pages`] | Pure XHTML builders: title, toc, chapter, photo, frameset |
//! | [`manifest`] | Package document, nav map and ordered archive entry lists |
//! | [`package`] | Zip writer enforcing the `mimetype`-first container rule |
//! | [`pipeline`] | Incremental build orchestration for both output kinds |
//! | [`imaging`] | Photo import, thumbnails, album list thumbnails |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`assets`] | Embedded stylesheets, `mimetype` and `container.xml` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Hand-Built XHTML, Maud for the Frameset
//!
//! E-book readers parse pages as XML and reject HTML void tags like `<br>`.
//! The `.xhtml` pages are therefore assembled as text with self-closing
//! forms, every user string passed through [`naming::escape`]. The website
//! landing frameset is plain HTML and rendered with
//! [Maud](https://maud.lambda.xyz/).
//!
//! ## Explicit Editing Context
//!
//! Operations receive the caller's selection as an [`model::EditingContext`]
//! value. Nothing in the crate keeps a "current album" or "current photo".

pub mod assets;
pub mod config;
pub mod imaging;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod output;
pub mod package;
pub mod pages;
pub mod pipeline;
pub mod stale;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
