//! Language Server Protocol implementation for C#
//!
//!     This crate provides a C# language server over stdio, backed by the
//!     solution model and scanner backend in `csharp-analysis`. Any
//!     LSP-compatible editor (VSCode, Neovim, Emacs, Sublime, etc.) can
//!     drive it.
//!
//! Design Decision: tower-lsp
//!
//!     tower-lsp carries the wire: Content-Length framing over stdio,
//!     request routing, `$/cancelRequest` (error -32800), and the
//!     not-initialized rejection (-32002). What this crate adds is the part
//!     the framework cannot know about: who owns the mutable solution and
//!     in what order mutations land.
//!
//! Architecture
//!
//!     State actor (`state`)
//!         All mutable server state lives in one task consuming a single
//!         event channel. Handlers receive immutable snapshots over oneshot
//!         replies; events apply in FIFO order. The write lease serializes
//!         mutating handlers while readers run freely against their
//!         snapshots.
//!
//!     Request scopes (`scope`)
//!         Read scope = one snapshot, dropped without ceremony. Write scope
//!         = the write lease; the lease request is posted synchronously at
//!         handler entry so writers queue in wire order, and release rides
//!         on Drop so cancelled handlers cannot wedge the queue.
//!
//!     Decompiled metadata (`metadata`)
//!         Symbols defined in compiled references materialize as read-only
//!         virtual documents under stable `csharp:` URIs, cached append-only
//!         across every solution change.
//!
//!     Diagnostics (`diagnostics`)
//!         Edits never publish inline. A timer tick drains the pending set
//!         and publishes once per document, coalescing bursts of changes.
//!
//!     Handlers (`server`, `features`)
//!         One tower-lsp `LanguageServer` implementation delegating per
//!         feature; every handler degrades to an empty result when its
//!         document is missing.

pub mod convert;
pub mod diagnostics;
pub mod features;
pub mod metadata;
pub mod scope;
pub mod server;
pub mod state;

pub use server::{CSharpLanguageServer, MetadataParams, ServerOptions};
