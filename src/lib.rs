//! # uhs-reader
//!
//! A reader for Universal Hint System files (.uhs format).
//! Supports the legacy 88a format and the 91a/95a/96a family, with
//! hint decryption, escape expansion, and hot-spot image regions.
pub mod uhs;

// Re-export the main types for convenience
pub use uhs::{
    error::{Result, UhsError},
    hotspot::HotSpotZone,
    node::{Node, NodeContent, NodeKind, SharedNode},
    parse,
    report::{DiagnosticSink, LogSink, NullSink, Severity},
    root::RootNode,
    AuxPolicy, UhsParser,
};
