use lazy_static::lazy_static;
use regex::Regex;

use crate::config::JudgeConfig;
use crate::judge::types::{CompileRequest, ErrorCode, JudgeError, JudgeRequest};

lazy_static! {
    /// Denylisted constructs that must never reach a compiler, even inside
    /// the sandbox. Matched against the raw source text.
    static ref DANGEROUS_PATTERNS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"\bsystem\s*\(").unwrap(), "system() call"),
        (Regex::new(r"\bexec[lv]p?e?\s*\(").unwrap(), "exec*() call"),
        (Regex::new(r"\bpopen\s*\(").unwrap(), "popen() call"),
        (Regex::new(r"\bfork\s*\(").unwrap(), "fork() call"),
        (Regex::new(r"\bclone\s*\(").unwrap(), "clone() call"),
        (Regex::new(r"\bptrace\s*\(").unwrap(), "ptrace() call"),
        (
            Regex::new(r#"#\s*include\s*[<"]sys/ptrace\.h[>"]"#).unwrap(),
            "ptrace header",
        ),
        (Regex::new(r"\b__asm__\b|\basm\s*(volatile)?\s*[\(\{]").unwrap(), "inline assembly"),
    ];
}

fn reject(code: ErrorCode, reason: impl Into<String>) -> JudgeError {
    JudgeError::Validation {
        code,
        reason: reason.into(),
    }
}

fn validate_source(code: &str, config: &JudgeConfig) -> Result<(), JudgeError> {
    if code.trim().is_empty() {
        return Err(reject(ErrorCode::InvalidCode, "Source code is empty"));
    }
    if code.len() as u64 > config.max_source_bytes {
        return Err(reject(
            ErrorCode::CodeTooLarge,
            format!(
                "Source code exceeds the maximum size of {} bytes",
                config.max_source_bytes
            ),
        ));
    }
    for (pattern, what) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(code) {
            return Err(reject(
                ErrorCode::DangerousCode,
                format!("Disallowed construct: {what}"),
            ));
        }
    }
    if code.contains('\0') {
        return Err(reject(
            ErrorCode::InvalidCode,
            "Source code contains null bytes",
        ));
    }
    Ok(())
}

fn validate_limits(
    stdin: Option<&str>,
    time_limit_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
    config: &JudgeConfig,
) -> Result<(), JudgeError> {
    if let Some(stdin) = stdin {
        if stdin.len() as u64 > config.max_stdin_bytes {
            return Err(reject(
                ErrorCode::InvalidCode,
                format!("stdin exceeds the maximum size of {} bytes", config.max_stdin_bytes),
            ));
        }
    }
    if let Some(ms) = time_limit_ms {
        if ms < config.min_time_limit_ms || ms > config.max_time_limit_ms {
            return Err(reject(
                ErrorCode::InvalidCode,
                format!(
                    "Time limit must be between {} and {} ms",
                    config.min_time_limit_ms, config.max_time_limit_ms
                ),
            ));
        }
    }
    if let Some(mb) = memory_limit_mb {
        if mb < config.min_memory_limit_mb || mb > config.max_memory_limit_mb {
            return Err(reject(
                ErrorCode::InvalidCode,
                format!(
                    "Memory limit must be between {} and {} MB",
                    config.min_memory_limit_mb, config.max_memory_limit_mb
                ),
            ));
        }
    }
    Ok(())
}

/// Gate a compile-and-run request before any resource is touched. Pure.
pub fn validate_compile(request: &CompileRequest, config: &JudgeConfig) -> Result<(), JudgeError> {
    validate_source(&request.code, config)?;
    validate_limits(
        request.stdin.as_deref(),
        request.time_limit_ms,
        request.memory_limit_mb,
        config,
    )
}

/// Gate a judge request: source and limit checks plus the test-case bounds.
pub fn validate_judge(request: &JudgeRequest, config: &JudgeConfig) -> Result<(), JudgeError> {
    validate_source(&request.code, config)?;
    validate_limits(None, request.time_limit_ms, request.memory_limit_mb, config)?;

    if request.test_cases.is_empty() {
        return Err(reject(ErrorCode::InvalidCode, "At least one test case is required"));
    }
    if request.test_cases.len() > config.max_test_cases {
        return Err(reject(
            ErrorCode::InvalidCode,
            format!("At most {} test cases are allowed", config.max_test_cases),
        ));
    }
    for (index, case) in request.test_cases.iter().enumerate() {
        let limit = config.max_test_case_field_bytes;
        if case.input.len() as u64 > limit || case.expected_output.len() as u64 > limit {
            return Err(reject(
                ErrorCode::InvalidCode,
                format!("Test case {index} exceeds the per-field size limit of {limit} bytes"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::types::TestCase;

    fn config() -> JudgeConfig {
        JudgeConfig::default()
    }

    fn compile_req(code: &str) -> CompileRequest {
        CompileRequest {
            code: code.to_string(),
            stdin: None,
            time_limit_ms: None,
            memory_limit_mb: None,
            optimization: None,
        }
    }

    fn code_of(err: JudgeError) -> ErrorCode {
        err.code()
    }

    #[test]
    fn accepts_plain_c() {
        let req = compile_req("#include <stdio.h>\nint main(){printf(\"hi\");return 0;}");
        assert!(validate_compile(&req, &config()).is_ok());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(
            code_of(validate_compile(&compile_req(""), &config()).unwrap_err()),
            ErrorCode::InvalidCode
        );
        assert_eq!(
            code_of(validate_compile(&compile_req("  \n\t "), &config()).unwrap_err()),
            ErrorCode::InvalidCode
        );
    }

    #[test]
    fn rejects_oversized_source() {
        let big = "a".repeat((config().max_source_bytes + 1) as usize);
        assert_eq!(
            code_of(validate_compile(&compile_req(&big), &config()).unwrap_err()),
            ErrorCode::CodeTooLarge
        );
        // Exactly at the 1 MiB boundary is allowed.
        let exact = format!("int main(){{}}{}", " ".repeat(1024 * 1024 - 12));
        assert_eq!(exact.len(), 1024 * 1024);
        assert!(validate_compile(&compile_req(&exact), &config()).is_ok());
    }

    #[test]
    fn rejects_dangerous_patterns() {
        for src in [
            "int main(){system(\"ls\");}",
            "int main(){execve(p, a, e);}",
            "int main(){popen(\"sh\", \"r\");}",
            "int main(){fork();}",
            "int main(){clone(f, s, 0, 0);}",
            "#include <sys/ptrace.h>\nint main(){}",
            "int main(){__asm__(\"nop\");}",
            "int main(){asm volatile(\"nop\");}",
        ] {
            let err = validate_compile(&compile_req(src), &config()).unwrap_err();
            assert_eq!(err.code(), ErrorCode::DangerousCode, "src: {src}");
        }
    }

    #[test]
    fn dangerous_check_requires_call_shape() {
        // Mentioning the words without a call is fine.
        let req = compile_req("int main(){int fork_count = 0; return fork_count;}");
        assert!(validate_compile(&req, &config()).is_ok());
    }

    #[test]
    fn rejects_null_bytes() {
        let err = validate_compile(&compile_req("int main(){}\0"), &config()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCode);
    }

    #[test]
    fn rejects_out_of_range_time_limit() {
        let mut req = compile_req("int main(){}");
        req.time_limit_ms = Some(50);
        assert!(validate_compile(&req, &config()).is_err());
        req.time_limit_ms = Some(30001);
        assert!(validate_compile(&req, &config()).is_err());
        req.time_limit_ms = Some(100);
        assert!(validate_compile(&req, &config()).is_ok());
        req.time_limit_ms = Some(30000);
        assert!(validate_compile(&req, &config()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_memory_limit() {
        let mut req = compile_req("int main(){}");
        req.memory_limit_mb = Some(8);
        assert!(validate_compile(&req, &config()).is_err());
        req.memory_limit_mb = Some(2048);
        assert!(validate_compile(&req, &config()).is_err());
        req.memory_limit_mb = Some(16);
        assert!(validate_compile(&req, &config()).is_ok());
        req.memory_limit_mb = Some(1024);
        assert!(validate_compile(&req, &config()).is_ok());

        let judge = JudgeRequest {
            code: "int main(){}".to_string(),
            test_cases: vec![TestCase {
                input: "1".into(),
                expected_output: "1".into(),
            }],
            time_limit_ms: None,
            memory_limit_mb: Some(4),
            optimization: None,
        };
        assert!(validate_judge(&judge, &config()).is_err());
    }

    #[test]
    fn rejects_oversized_stdin() {
        let mut req = compile_req("int main(){}");
        req.stdin = Some("x".repeat(10 * 1024 + 1));
        assert!(validate_compile(&req, &config()).is_err());
    }

    #[test]
    fn judge_requires_test_cases_in_bounds() {
        let base = JudgeRequest {
            code: "int main(){}".to_string(),
            test_cases: vec![],
            time_limit_ms: None,
            memory_limit_mb: None,
            optimization: None,
        };
        assert!(validate_judge(&base, &config()).is_err());

        let mut many = base.clone();
        many.test_cases = vec![
            TestCase {
                input: "1".into(),
                expected_output: "1".into(),
            };
            101
        ];
        assert!(validate_judge(&many, &config()).is_err());

        let mut ok = base.clone();
        ok.test_cases = vec![TestCase {
            input: "1".into(),
            expected_output: "1".into(),
        }];
        assert!(validate_judge(&ok, &config()).is_ok());

        let mut fat = base;
        fat.test_cases = vec![TestCase {
            input: "x".repeat(10 * 1024 + 1),
            expected_output: "1".into(),
        }];
        assert!(validate_judge(&fat, &config()).is_err());
    }
}
