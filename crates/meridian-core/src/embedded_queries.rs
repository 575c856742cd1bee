//! Embedded Tree-sitter queries for code parsing.
//!
//! This module contains all the tree-sitter query files embedded at compile time,
//! allowing the binary to work without external query files.
//!
//! ## Query Types
//!
//! - **Code Tags**: Extract code entities (functions, classes, etc.) from source files
//! - **Manifest Tags**: Extract component info and dependencies from manifest files

use crate::parser::{ManifestLanguage, SupportedLanguage};

// Base tag queries - embedded at compile time
const C_TAGS: &str = include_str!("../queries/c-tags.scm");
const CPP_TAGS: &str = include_str!("../queries/cpp-tags.scm");
const CSHARP_TAGS: &str = include_str!("../queries/csharp-tags.scm");
const GO_TAGS: &str = include_str!("../queries/go-tags.scm");
const JAVASCRIPT_TAGS: &str = include_str!("../queries/javascript-tags.scm");
const PYTHON_TAGS: &str = include_str!("../queries/python-tags.scm");
const RUST_TAGS: &str = include_str!("../queries/rust-tags.scm");
const TYPESCRIPT_TAGS: &str = include_str!("../queries/typescript-tags.scm");

// Test overlay queries - embedded at compile time
const C_TEST: &str = include_str!("../queries/overlays/c-test.scm");
const CPP_TEST: &str = include_str!("../queries/overlays/cpp-test.scm");
const CSHARP_TEST: &str = include_str!("../queries/overlays/csharp-test.scm");
const GO_TEST: &str = include_str!("../queries/overlays/go-test.scm");
const JAVASCRIPT_TEST: &str = include_str!("../queries/overlays/javascript-test.scm");
const PYTHON_TEST: &str = include_str!("../queries/overlays/python-test.scm");
const RUST_TEST: &str = include_str!("../queries/overlays/rust-test.scm");
const TYPESCRIPT_TEST: &str = include_str!("../queries/overlays/typescript-test.scm");

// Manifest tag queries - embedded at compile time
const JSON_MANIFEST_TAGS: &str = include_str!("../queries/json-manifest-tags.scm");
const TOML_MANIFEST_TAGS: &str = include_str!("../queries/toml-manifest-tags.scm");
const GOMOD_MANIFEST_TAGS: &str = include_str!("../queries/gomod-manifest-tags.scm");
const XML_MANIFEST_TAGS: &str = include_str!("../queries/xml-manifest-tags.scm");
const CMAKE_MANIFEST_TAGS: &str = include_str!("../queries/cmake-manifest-tags.scm");

/// Get the embedded query source for a language.
///
/// Returns the base tags query concatenated with any overlay queries.
pub fn get_query(language: SupportedLanguage) -> Option<String> {
    let base = get_base_query(language)?;
    let overlay = get_test_overlay(language);

    match overlay {
        Some(test_query) => Some(format!("{}\n\n{}", base, test_query)),
        None => Some(base.to_string()),
    }
}

/// Get only the base tags query for a language.
pub fn get_base_query(language: SupportedLanguage) -> Option<&'static str> {
    match language {
        SupportedLanguage::C => Some(C_TAGS),
        SupportedLanguage::Cpp => Some(CPP_TAGS),
        SupportedLanguage::CSharp => Some(CSHARP_TAGS),
        SupportedLanguage::Go => Some(GO_TAGS),
        SupportedLanguage::JavaScript => Some(JAVASCRIPT_TAGS),
        SupportedLanguage::Python => Some(PYTHON_TAGS),
        SupportedLanguage::Rust => Some(RUST_TAGS),
        SupportedLanguage::TypeScript => Some(TYPESCRIPT_TAGS),
        _ => None,
    }
}

/// Get the test overlay query for a language.
fn get_test_overlay(language: SupportedLanguage) -> Option<&'static str> {
    match language {
        SupportedLanguage::C => Some(C_TEST),
        SupportedLanguage::Cpp => Some(CPP_TEST),
        SupportedLanguage::CSharp => Some(CSHARP_TEST),
        SupportedLanguage::Go => Some(GO_TEST),
        SupportedLanguage::JavaScript => Some(JAVASCRIPT_TEST),
        SupportedLanguage::Python => Some(PYTHON_TEST),
        SupportedLanguage::Rust => Some(RUST_TEST),
        SupportedLanguage::TypeScript => Some(TYPESCRIPT_TEST),
        _ => None,
    }
}

/// Check if embedded queries are available for a language.
pub fn has_embedded_query(language: SupportedLanguage) -> bool {
    get_base_query(language).is_some()
}

/// Get a list of all languages with embedded queries.
pub fn supported_languages() -> &'static [SupportedLanguage] {
    &[
        SupportedLanguage::C,
        SupportedLanguage::Cpp,
        SupportedLanguage::CSharp,
        SupportedLanguage::Go,
        SupportedLanguage::JavaScript,
        SupportedLanguage::Python,
        SupportedLanguage::Rust,
        SupportedLanguage::TypeScript,
    ]
}

// ============================================================================
// Manifest Queries
// ============================================================================

/// Get the embedded manifest query for a manifest language.
///
/// Returns the query source for extracting component names and dependencies
/// from manifest files (package.json, Cargo.toml, etc.).
pub fn get_manifest_query(language: ManifestLanguage) -> &'static str {
    match language {
        ManifestLanguage::Json => JSON_MANIFEST_TAGS,
        ManifestLanguage::Toml => TOML_MANIFEST_TAGS,
        ManifestLanguage::GoMod => GOMOD_MANIFEST_TAGS,
        ManifestLanguage::Xml => XML_MANIFEST_TAGS,
        ManifestLanguage::CMake => CMAKE_MANIFEST_TAGS,
    }
}

/// Check if embedded manifest queries are available for a manifest language.
///
/// Always returns true since all manifest languages have embedded queries.
pub fn has_manifest_query(language: ManifestLanguage) -> bool {
    // All manifest languages have embedded queries
    match language {
        ManifestLanguage::Json
        | ManifestLanguage::Toml
        | ManifestLanguage::GoMod
        | ManifestLanguage::Xml
        | ManifestLanguage::CMake => true,
    }
}

/// Get a list of all manifest languages with embedded queries.
pub fn supported_manifest_languages() -> &'static [ManifestLanguage] {
    &[
        ManifestLanguage::Json,
        ManifestLanguage::Toml,
        ManifestLanguage::GoMod,
        ManifestLanguage::Xml,
        ManifestLanguage::CMake,
    ]
}

/// Test function for verifying incremental sync works.
/// This function exists solely to test that graph updates and search indexing work correctly.
pub fn sync_verification_test_function() -> &'static str {
    "sync_verification_success"
}
