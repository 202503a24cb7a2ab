//! Solution model and compiler-backend services for the C# language server
//!
//! This crate holds everything below the protocol layer: the immutable
//! solution snapshot model, text positioning, declaration scanning, and the
//! backend contract the server's handlers are written against.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `text`: byte-offset spans, the line index and the UTF-16 wire boundary
//! - `solution`: immutable `Solution`/`Project`/`Document` snapshots
//! - `syntax`: the C# declaration and identifier scanner
//! - `references`: reference, implementation and declaration search
//! - `hover`: display strings and XML documentation formatting
//! - `completion`: keyword, declaration and member candidates
//! - `formatting`: brace-depth reindentation edits
//! - `diagnostics`: delimiter-balance and duplicate-type diagnostics
//! - `decompile`: metadata stub tables and the skeleton decompiler
//! - `backend`: the `CompilerBackend` trait and its scanner implementation
//! - `cancel`: cooperative cancellation tokens
//!
//! # Design Principles
//!
//! - **Snapshot-based**: mutating operations return new solutions; readers
//!   holding an old snapshot are never invalidated
//! - **Protocol-agnostic**: no LSP request types here, only the handful of
//!   `lsp_types` enums shared with the wire format
//! - **Scanner, not compiler**: symbol resolution is identifier-shaped by
//!   design; the [`backend::CompilerBackend`] trait is where a real compiler
//!   front end would plug in

pub mod backend;
pub mod cancel;
pub mod completion;
pub mod decompile;
pub mod diagnostics;
pub mod formatting;
pub mod hover;
pub mod references;
pub mod solution;
pub mod syntax;
pub mod text;

// Test support (available in tests and as dev-dependency)
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{CompilerBackend, ScannerBackend};
pub use solution::{Document, DocumentId, ProjectId, Solution};
