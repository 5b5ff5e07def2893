use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat failure taxonomy shared by all public operations. The wire form is
/// SCREAMING_SNAKE_CASE (`errorCode` in responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation-time
    InvalidCode,
    CodeTooLarge,
    DangerousCode,
    // Admission-time
    RateLimitExceeded,
    ServerBusy,
    // Compile-time
    CompilationError,
    SyntaxError,
    DeclarationError,
    TypeMismatchError,
    ScopeError,
    // Run-time
    RuntimeError,
    SegmentationFault,
    FloatingPointException,
    MemoryLimitExceeded,
    TimeLimitExceeded,
    CompilationTimeout,
    // Infrastructure
    ContainerError,
    InternalError,
}

impl ErrorCode {
    /// Fixed human-readable message for each tag.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCode => "Invalid or empty source code",
            ErrorCode::CodeTooLarge => "Source code exceeds the maximum allowed size",
            ErrorCode::DangerousCode => "Source code contains disallowed constructs",
            ErrorCode::RateLimitExceeded => "Too many requests, please slow down",
            ErrorCode::ServerBusy => "Server is busy, please try again shortly",
            ErrorCode::CompilationError => "Compilation failed",
            ErrorCode::SyntaxError => "Syntax error in source code",
            ErrorCode::DeclarationError => "Use of an undeclared identifier",
            ErrorCode::TypeMismatchError => "Type mismatch in source code",
            ErrorCode::ScopeError => "Identifier used outside of its scope",
            ErrorCode::RuntimeError => "Program exited abnormally",
            ErrorCode::SegmentationFault => "Segmentation fault (invalid memory access)",
            ErrorCode::FloatingPointException => "Floating point exception (division by zero?)",
            ErrorCode::MemoryLimitExceeded => "Program exceeded the memory limit",
            ErrorCode::TimeLimitExceeded => "Program exceeded the time limit",
            ErrorCode::CompilationTimeout => "Compilation took too long",
            ErrorCode::ContainerError => "Sandbox environment failure",
            ErrorCode::InternalError => "An internal error occurred",
        }
    }
}

/// Typed failure produced anywhere inside the engine. Every variant maps to
/// exactly one [`ErrorCode`].
#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    #[error("{reason}")]
    Validation { code: ErrorCode, reason: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("too many concurrent compilations")]
    Busy,

    #[error("{message}")]
    Compiler {
        code: ErrorCode,
        message: String,
        details: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },

    #[error("container error: {0}")]
    Container(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JudgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            JudgeError::Validation { code, .. } => *code,
            JudgeError::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            JudgeError::Busy => ErrorCode::ServerBusy,
            JudgeError::Compiler { code, .. } => *code,
            JudgeError::Container(_) => ErrorCode::ContainerError,
            JudgeError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message safe to show a caller. Validation reasons are already
    /// user-authored; everything else falls back to the fixed tag message.
    pub fn user_message(&self) -> String {
        match self {
            JudgeError::Validation { reason, .. } => reason.clone(),
            JudgeError::Compiler { message, .. } => message.clone(),
            _ => self.code().message().to_string(),
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            JudgeError::Compiler { details, .. } => details.clone(),
            _ => None,
        }
    }

    pub fn line_column(&self) -> (Option<u32>, Option<u32>) {
        match self {
            JudgeError::Compiler { line, column, .. } => (*line, *column),
            _ => (None, None),
        }
    }
}

/// Optimization level requested by the client: `0`..`3` or `"size"`.
/// Accepts both the numeric and string forms on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "OptLevelWire", into = "OptLevelWire")]
pub enum OptLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
    Size,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OptLevelWire {
    Num(u8),
    Text(String),
}

impl TryFrom<OptLevelWire> for OptLevel {
    type Error = String;

    fn try_from(raw: OptLevelWire) -> Result<Self, Self::Error> {
        let text = match raw {
            OptLevelWire::Num(n) => n.to_string(),
            OptLevelWire::Text(s) => s,
        };
        match text.as_str() {
            "0" => Ok(OptLevel::O0),
            "1" => Ok(OptLevel::O1),
            "2" => Ok(OptLevel::O2),
            "3" => Ok(OptLevel::O3),
            "size" => Ok(OptLevel::Size),
            other => Err(format!("invalid optimization level: {other}")),
        }
    }
}

impl From<OptLevel> for OptLevelWire {
    fn from(level: OptLevel) -> Self {
        match level {
            OptLevel::O0 => OptLevelWire::Num(0),
            OptLevel::O1 => OptLevelWire::Num(1),
            OptLevel::O2 => OptLevelWire::Num(2),
            OptLevel::O3 => OptLevelWire::Num(3),
            OptLevel::Size => OptLevelWire::Text("size".to_string()),
        }
    }
}

impl OptLevel {
    pub fn gcc_flag(&self) -> &'static str {
        match self {
            OptLevel::O0 => "-O0",
            OptLevel::O1 => "-O1",
            OptLevel::O2 => "-O2",
            OptLevel::O3 => "-O3",
            OptLevel::Size => "-Os",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub code: String,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub optimization: Option<OptLevel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl CompileResponse {
    pub fn ok(output: String, compile_ms: u64, exec_ms: u64) -> Self {
        Self {
            success: true,
            output: Some(output),
            compilation_time: Some(compile_ms),
            execution_time: Some(exec_ms),
            error: None,
            error_code: None,
            error_details: None,
            line: None,
            column: None,
        }
    }

    pub fn failed(err: &JudgeError, compile_ms: Option<u64>, exec_ms: Option<u64>) -> Self {
        let (line, column) = err.line_column();
        Self {
            success: false,
            output: None,
            compilation_time: compile_ms,
            execution_time: exec_ms,
            error: Some(err.user_message()),
            error_code: Some(err.code()),
            error_details: err.details(),
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRequest {
    pub code: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub optimization: Option<OptLevel>,
}

/// Judge a submission against test cases held by the external store,
/// keyed by room and question.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeFileRequest {
    pub code: String,
    pub room_id: String,
    pub question_id: String,
    #[serde(default)]
    pub include_private: bool,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub optimization: Option<OptLevel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub index: usize,
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResponse {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<TestCaseResult>,
}

impl JudgeResponse {
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            passed,
            failed: results.len() - passed,
            total: results.len(),
            results,
        }
    }

    /// Every test case failed with the same error, without any run having
    /// taken place (compile failure, admission rejection, and so on).
    pub fn all_failed(cases: &[TestCase], err: &JudgeError) -> Self {
        let results = cases
            .iter()
            .enumerate()
            .map(|(index, case)| TestCaseResult {
                index,
                passed: false,
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: None,
                error: Some(err.user_message()),
                execution_time: None,
            })
            .collect();
        Self::from_results(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_wire_form_is_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::TimeLimitExceeded).unwrap();
        assert_eq!(json, "\"TIME_LIMIT_EXCEEDED\"");
        let json = serde_json::to_string(&ErrorCode::SegmentationFault).unwrap();
        assert_eq!(json, "\"SEGMENTATION_FAULT\"");
    }

    #[test]
    fn opt_level_accepts_numbers_and_size() {
        let req: CompileRequest =
            serde_json::from_str(r#"{"code":"int main(){}","optimization":2}"#).unwrap();
        assert_eq!(req.optimization, Some(OptLevel::O2));

        let req: CompileRequest =
            serde_json::from_str(r#"{"code":"int main(){}","optimization":"size"}"#).unwrap();
        assert_eq!(req.optimization, Some(OptLevel::Size));
        assert_eq!(req.optimization.unwrap().gcc_flag(), "-Os");

        let bad: Result<CompileRequest, _> =
            serde_json::from_str(r#"{"code":"int main(){}","optimization":7}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn compile_request_uses_camel_case() {
        let req: CompileRequest = serde_json::from_str(
            r#"{"code":"int main(){}","stdin":"5 7","timeLimitMs":2000}"#,
        )
        .unwrap();
        assert_eq!(req.stdin.as_deref(), Some("5 7"));
        assert_eq!(req.time_limit_ms, Some(2000));
    }

    #[test]
    fn judge_response_counts_from_results() {
        let results = vec![
            TestCaseResult {
                index: 0,
                passed: true,
                input: "1".into(),
                expected_output: "1".into(),
                actual_output: Some("1".into()),
                error: None,
                execution_time: Some(3),
            },
            TestCaseResult {
                index: 1,
                passed: false,
                input: "2".into(),
                expected_output: "2".into(),
                actual_output: Some("3".into()),
                error: Some("Output mismatch".into()),
                execution_time: Some(2),
            },
        ];
        let resp = JudgeResponse::from_results(results);
        assert_eq!((resp.passed, resp.failed, resp.total), (1, 1, 2));
    }

    #[test]
    fn all_failed_reuses_one_error() {
        let cases = vec![
            TestCase {
                input: "a".into(),
                expected_output: "b".into(),
            },
            TestCase {
                input: "c".into(),
                expected_output: "d".into(),
            },
        ];
        let err = JudgeError::Compiler {
            code: ErrorCode::SyntaxError,
            message: "Syntax error in source code".into(),
            details: None,
            line: Some(3),
            column: None,
        };
        let resp = JudgeResponse::all_failed(&cases, &err);
        assert_eq!((resp.passed, resp.failed, resp.total), (0, 2, 2));
        assert!(resp
            .results
            .iter()
            .all(|r| r.error.as_deref() == Some("Syntax error in source code")));
    }
}
