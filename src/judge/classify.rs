//! Turns raw compiler and runtime diagnostic text into the stable error
//! taxonomy plus a sanitized, user-safe detail string.
//!
//! Classification precedence is a behavioral contract: runtime signals are
//! checked before generic `error:` text, and within compile errors the bucket
//! order is declaration, type-mismatch, scope, syntax. Downstream line
//! highlighting depends on this order staying fixed.

use lazy_static::lazy_static;
use regex::Regex;

use crate::judge::types::ErrorCode;

pub const MAX_DETAIL_CHARS: usize = 2000;

/// Location and message of the first offending diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

lazy_static! {
    static ref ERROR_LINE: Regex =
        Regex::new(r"(?m)^([^:\n]+):(\d+):(\d+):\s*(?:fatal\s+)?error:\s*(.+)$").unwrap();
    static ref WARNING_LINE: Regex =
        Regex::new(r"(?m)^([^:\n]+):(\d+):(\d+):\s*warning:\s*(.+)$").unwrap();
    static ref BARE_LINE: Regex = Regex::new(r"(?i)\bline\s+(\d+)").unwrap();
    static ref ABS_PATH: Regex = Regex::new(r"(/[\w.\-]+)+").unwrap();
    static ref WORKSPACE_FILE: Regex =
        Regex::new(r"\b(?:src|bin)_[0-9a-f]{32}(?:\.c)?\b").unwrap();
}

/// Find the first `<file>:<line>:<col>: (error|fatal error): <msg>` line,
/// preferring true errors over warnings, then a bare "line N" mention, then
/// the whole text as the message.
pub fn parse_diagnostic(text: &str) -> Diagnostic {
    for pattern in [&*ERROR_LINE, &*WARNING_LINE] {
        if let Some(caps) = pattern.captures(text) {
            return Diagnostic {
                line: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                column: caps.get(3).and_then(|m| m.as_str().parse().ok()),
                message: caps.get(4).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            };
        }
    }
    if let Some(caps) = BARE_LINE.captures(text) {
        return Diagnostic {
            line: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            column: None,
            message: text.trim().to_string(),
        };
    }
    Diagnostic {
        line: None,
        column: None,
        message: text.trim().to_string(),
    }
}

/// Map diagnostic text to exactly one taxonomy tag.
pub fn classify(text: &str) -> ErrorCode {
    let lower = text.to_lowercase();

    // Runtime signals take precedence over anything that merely looks like
    // compiler output.
    if lower.contains("segmentation fault") || lower.contains("sigsegv") {
        return ErrorCode::SegmentationFault;
    }
    if lower.contains("floating point exception") || lower.contains("sigfpe") {
        return ErrorCode::FloatingPointException;
    }
    if lower.contains("out of memory") || lower.contains("cannot allocate memory") {
        return ErrorCode::MemoryLimitExceeded;
    }
    if lower.contains("time limit") || lower.contains("timed out") {
        return ErrorCode::TimeLimitExceeded;
    }

    if lower.contains("error:") || lower.contains("error ") {
        // Bucket order is fixed: declaration, type-mismatch, scope, syntax.
        const DECLARATION: &[&str] = &[
            "undeclared",
            "implicit declaration",
            "undefined reference",
            "redefinition",
            "redeclared",
            "conflicting types",
        ];
        const TYPE_MISMATCH: &[&str] = &[
            "incompatible type",
            "incompatible pointer",
            "invalid conversion",
            "type mismatch",
            "incompatible integer",
        ];
        const SCOPE: &[&str] = &["not declared in this scope", "out of scope", "scope"];
        const SYNTAX: &[&str] = &[
            "expected",
            "missing terminating",
            "stray",
            "unterminated",
            "syntax error",
        ];

        for (needles, code) in [
            (DECLARATION, ErrorCode::DeclarationError),
            (TYPE_MISMATCH, ErrorCode::TypeMismatchError),
            (SCOPE, ErrorCode::ScopeError),
            (SYNTAX, ErrorCode::SyntaxError),
        ] {
            if needles.iter().any(|n| lower.contains(n)) {
                return code;
            }
        }
        return ErrorCode::CompilationError;
    }

    ErrorCode::RuntimeError
}

/// Strip host paths and workspace file names and cap the length, preserving
/// line breaks so per-line diagnostics stay readable.
pub fn sanitize(text: &str) -> String {
    let cleaned = WORKSPACE_FILE.replace_all(text, "main.c");
    let cleaned = cleaned.replace("/sandbox/", "");
    let cleaned = ABS_PATH.replace_all(&cleaned, "main.c");

    let mut out = String::with_capacity(cleaned.len().min(MAX_DETAIL_CHARS));
    for ch in cleaned.chars().take(MAX_DETAIL_CHARS) {
        out.push(ch);
    }
    out.trim_end().to_string()
}
