//! Judging orchestrator. Every public operation follows the same spine:
//! validate, rate-limit, concurrency budget, acquire a container, do the
//! work, fire-and-forget workspace cleanup.

use base64::prelude::{Engine, BASE64_STANDARD};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::JudgeConfig;
use crate::docker::{exec_with_limits, ContainerPool, DockerClient, ExecError, ExecLimits};
use crate::judge::classify;
use crate::judge::ratelimit::RateLimiter;
use crate::judge::types::{
    CompileRequest, CompileResponse, ErrorCode, JudgeError, JudgeFileRequest, JudgeRequest,
    JudgeResponse, OptLevel, TestCase, TestCaseResult,
};
use crate::judge::validate;
use crate::testcases::TestCaseLoader;

const COMPILE_MARKER: &str = "__CJUDGE_COMPILE__:";

/// Headroom added to the host-side wall clock around the in-container
/// `timeout` guard.
const EXEC_GRACE_MS: u64 = 2000;

/// One combined invocation: write, compile, emit the compile marker, then
/// run against stdin. The base64-encoded source arrives on the exec's
/// attached stdin (a single execve env string is capped at 128 KiB on
/// Linux, far below the 1 MiB source allowance); only small fields ride
/// the environment. Compiler diagnostics are replayed onto stderr after
/// the marker so the host can split the streams.
const COMPILE_RUN_SCRIPT: &str = r#"
cd /sandbox || exit 90
base64 -d > "src_$CJUDGE_WID.c" || exit 91
t0=$(date +%s%3N)
gcc "$CJUDGE_OPT" -o "bin_$CJUDGE_WID" "src_$CJUDGE_WID.c" 2> "err_$CJUDGE_WID.log"
cstat=$?
t1=$(date +%s%3N)
echo "__CJUDGE_COMPILE__:$cstat:$((t1 - t0))"
cat "err_$CJUDGE_WID.log" >&2
if [ "$cstat" -ne 0 ]; then exit 65; fi
[ -n "$CJUDGE_MEMKB" ] && ulimit -v "$CJUDGE_MEMKB" 2>/dev/null
printf '%s' "$CJUDGE_IN_B64" | base64 -d | timeout -s KILL "$CJUDGE_TSEC" "./bin_$CJUDGE_WID"
exit $?
"#;

const COMPILE_ONLY_SCRIPT: &str = r#"
cd /sandbox || exit 90
base64 -d > "src_$CJUDGE_WID.c" || exit 91
t0=$(date +%s%3N)
gcc "$CJUDGE_OPT" -o "bin_$CJUDGE_WID" "src_$CJUDGE_WID.c"
cstat=$?
t1=$(date +%s%3N)
echo "__CJUDGE_COMPILE__:$cstat:$((t1 - t0))"
exit $cstat
"#;

const RUN_SCRIPT: &str = r#"
cd /sandbox || exit 90
[ -n "$CJUDGE_MEMKB" ] && ulimit -v "$CJUDGE_MEMKB" 2>/dev/null
timeout -s KILL "$CJUDGE_TSEC" "./bin_$CJUDGE_WID"
exit $?
"#;

const CLEANUP_SCRIPT: &str = r#"rm -f /sandbox/*"$CJUDGE_WID"*"#;

pub struct CompilerService {
    config: Arc<JudgeConfig>,
    docker: Arc<DockerClient>,
    pool: Arc<ContainerPool>,
    limiter: Arc<RateLimiter>,
    slots: Arc<Semaphore>,
}

impl CompilerService {
    pub fn new(
        config: Arc<JudgeConfig>,
        docker: Arc<DockerClient>,
        pool: Arc<ContainerPool>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_compilations));
        Self {
            config,
            docker,
            pool,
            limiter,
            slots,
        }
    }

    /// Compile one submission and run it against optional stdin.
    ///
    /// `Err` is returned only for validation and rate-limit rejections (the
    /// caller maps those to 400/429); every other outcome, including "server
    /// busy" and sandbox faults, is a fully-typed `CompileResponse`.
    pub async fn compile_and_run(
        &self,
        request: &CompileRequest,
        identifier: &str,
    ) -> Result<CompileResponse, JudgeError> {
        validate::validate_compile(request, &self.config)?;
        self.limiter.check(identifier)?;

        let Ok(_permit) = self.slots.try_acquire() else {
            info!("Rejecting compile request from {}: all slots busy", identifier);
            return Ok(CompileResponse::failed(&JudgeError::Busy, None, None));
        };

        match self.compile_and_run_inner(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!("compile_and_run failed: {}", err);
                Ok(CompileResponse::failed(&err, None, None))
            }
        }
    }

    async fn compile_and_run_inner(
        &self,
        request: &CompileRequest,
    ) -> Result<CompileResponse, JudgeError> {
        let container = self.acquire_container().await?;
        let wid = Uuid::new_v4().simple().to_string();
        let time_limit_ms = self.config.effective_time_limit_ms(request.time_limit_ms);
        let opt = request.optimization.unwrap_or_default();

        let (env, source_b64) = combined_exec_inputs(request, &wid, time_limit_ms, opt);
        let limits = ExecLimits {
            time_limit_ms: self.config.compile_timeout_ms + time_limit_ms + EXEC_GRACE_MS,
            max_stdout_bytes: self.config.max_stdout_bytes,
            max_stderr_bytes: self.config.max_stderr_bytes,
            kill_pattern: Some(wid.clone()),
        };

        let result = exec_with_limits(
            &self.docker,
            &container,
            shell(COMPILE_RUN_SCRIPT),
            env,
            Some(&source_b64),
            &limits,
        )
        .await;
        self.spawn_cleanup(container.clone(), wid);

        let out = match result {
            Ok(out) => out,
            // The in-container timeout guard handles run overruns, so the
            // host wall clock firing means compilation itself hung.
            Err(ExecError::Timeout { .. }) => {
                let err = fixed_error(ErrorCode::CompilationTimeout);
                return Ok(CompileResponse::failed(&err, None, None));
            }
            Err(ExecError::OutputLimit { stream, .. }) => {
                let err = JudgeError::Compiler {
                    code: ErrorCode::RuntimeError,
                    message: format!("Output limit exceeded on {stream}"),
                    details: None,
                    line: None,
                    column: None,
                };
                return Ok(CompileResponse::failed(&err, None, None));
            }
            Err(ExecError::Runtime(e)) => return Err(JudgeError::Container(e.to_string())),
        };

        let Some(marker) = split_compile_marker(&out.stdout) else {
            return Err(JudgeError::Internal(
                "compile marker missing from sandbox output".to_string(),
            ));
        };

        if marker.status != 0 {
            let err = compile_error_from(&out.stderr);
            return Ok(CompileResponse::failed(&err, Some(marker.compile_ms), None));
        }

        let run_ms = out.elapsed_ms.saturating_sub(marker.compile_ms);
        if out.exit_code != 0 {
            let err = run_failure(out.exit_code, &out.stderr, run_ms, time_limit_ms);
            return Ok(CompileResponse::failed(
                &err,
                Some(marker.compile_ms),
                Some(run_ms),
            ));
        }

        Ok(CompileResponse::ok(
            marker.program_output.trim().to_string(),
            marker.compile_ms,
            run_ms,
        ))
    }

    /// Compile once, then score the submission against every test case.
    ///
    /// Always resolves to a full scoreboard once admission passes: a compile
    /// failure marks every case failed with the same error without running
    /// anything, and a mid-run sandbox fault synthesizes failures for the
    /// remaining cases.
    pub async fn judge(
        &self,
        request: &JudgeRequest,
        identifier: &str,
    ) -> Result<JudgeResponse, JudgeError> {
        validate::validate_judge(request, &self.config)?;
        self.limiter.check(identifier)?;

        let Ok(_permit) = self.slots.try_acquire() else {
            info!("Rejecting judge request from {}: all slots busy", identifier);
            return Ok(JudgeResponse::all_failed(&request.test_cases, &JudgeError::Busy));
        };

        match self.judge_inner(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!("judge failed: {}", err);
                Ok(JudgeResponse::all_failed(&request.test_cases, &err))
            }
        }
    }

    async fn judge_inner(&self, request: &JudgeRequest) -> Result<JudgeResponse, JudgeError> {
        let container = self.acquire_container().await?;
        let wid = Uuid::new_v4().simple().to_string();
        let time_limit_ms = self.config.effective_time_limit_ms(request.time_limit_ms);
        let opt = request.optimization.unwrap_or_default();

        let env = vec![
            format!("CJUDGE_WID={wid}"),
            format!("CJUDGE_OPT={}", opt.gcc_flag()),
        ];
        let source_b64 = BASE64_STANDARD.encode(&request.code);
        let limits = ExecLimits {
            time_limit_ms: self.config.compile_timeout_ms + EXEC_GRACE_MS,
            max_stdout_bytes: self.config.max_stdout_bytes,
            max_stderr_bytes: self.config.max_stderr_bytes,
            kill_pattern: Some(wid.clone()),
        };

        let compile = exec_with_limits(
            &self.docker,
            &container,
            shell(COMPILE_ONLY_SCRIPT),
            env,
            Some(&source_b64),
            &limits,
        )
        .await;

        let out = match compile {
            Ok(out) => out,
            Err(ExecError::Timeout { .. }) => {
                self.spawn_cleanup(container, wid);
                let err = fixed_error(ErrorCode::CompilationTimeout);
                return Ok(JudgeResponse::all_failed(&request.test_cases, &err));
            }
            Err(ExecError::OutputLimit { .. }) => {
                self.spawn_cleanup(container, wid);
                let err = fixed_error(ErrorCode::CompilationError);
                return Ok(JudgeResponse::all_failed(&request.test_cases, &err));
            }
            Err(ExecError::Runtime(e)) => {
                self.spawn_cleanup(container, wid);
                return Err(JudgeError::Container(e.to_string()));
            }
        };

        if out.exit_code != 0 {
            // Fail fast: no test case is ever run against a broken build.
            self.spawn_cleanup(container, wid);
            let err = compile_error_from(&out.stderr);
            return Ok(JudgeResponse::all_failed(&request.test_cases, &err));
        }

        if let Some(marker) = split_compile_marker(&out.stdout) {
            info!("Judge build compiled in {} ms", marker.compile_ms);
        }

        let mut results = Vec::with_capacity(request.test_cases.len());
        for (index, case) in request.test_cases.iter().enumerate() {
            match self
                .run_test(&container, &wid, case, index, time_limit_ms, request.memory_limit_mb)
                .await
            {
                Ok(result) => results.push(result),
                Err(fault) => {
                    warn!("Sandbox fault during test {}: {}", index, fault);
                    for (rest_index, rest) in request.test_cases.iter().enumerate().skip(index) {
                        results.push(TestCaseResult {
                            index: rest_index,
                            passed: false,
                            input: rest.input.clone(),
                            expected_output: rest.expected_output.clone(),
                            actual_output: None,
                            error: Some(ErrorCode::ContainerError.message().to_string()),
                            execution_time: None,
                        });
                    }
                    break;
                }
            }
        }

        self.spawn_cleanup(container, wid);
        Ok(JudgeResponse::from_results(results))
    }

    async fn run_test(
        &self,
        container: &str,
        wid: &str,
        case: &TestCase,
        index: usize,
        time_limit_ms: u64,
        memory_limit_mb: Option<u64>,
    ) -> Result<TestCaseResult, ExecError> {
        let mut env = vec![
            format!("CJUDGE_WID={wid}"),
            format!("CJUDGE_TSEC={}", format_seconds(time_limit_ms)),
        ];
        if let Some(mb) = memory_limit_mb {
            env.push(format!("CJUDGE_MEMKB={}", mb * 1024));
        }
        let limits = ExecLimits {
            time_limit_ms: time_limit_ms + EXEC_GRACE_MS,
            max_stdout_bytes: self.config.max_stdout_bytes,
            max_stderr_bytes: self.config.max_stderr_bytes,
            kill_pattern: Some(wid.to_string()),
        };

        let result = exec_with_limits(
            &self.docker,
            container,
            shell(RUN_SCRIPT),
            env,
            Some(&case.input),
            &limits,
        )
        .await;

        let entry = |passed, actual: Option<String>, error: Option<String>, ms: Option<u64>| {
            TestCaseResult {
                index,
                passed,
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: actual,
                error,
                execution_time: ms,
            }
        };

        let out = match result {
            Ok(out) => out,
            Err(ExecError::Timeout { .. }) => {
                return Ok(entry(
                    false,
                    None,
                    Some(ErrorCode::TimeLimitExceeded.message().to_string()),
                    Some(time_limit_ms),
                ))
            }
            Err(ExecError::OutputLimit { stream, .. }) => {
                return Ok(entry(
                    false,
                    None,
                    Some(format!("Output limit exceeded on {stream}")),
                    None,
                ))
            }
            // Sandbox-level fault: let the caller synthesize the remainder.
            Err(fault @ ExecError::Runtime(_)) => return Err(fault),
        };

        if out.exit_code != 0 {
            let err = run_failure(out.exit_code, &out.stderr, out.elapsed_ms, time_limit_ms);
            let actual = non_empty_trimmed(&out.stdout);
            return Ok(entry(false, actual, Some(err.user_message()), Some(out.elapsed_ms)));
        }

        let actual = out.stdout.trim().to_string();
        if actual.is_empty() && !out.stderr.trim().is_empty() {
            // stderr with no stdout is an execution failure, not a mismatch.
            return Ok(entry(
                false,
                None,
                Some(ErrorCode::RuntimeError.message().to_string()),
                Some(out.elapsed_ms),
            ));
        }

        if outputs_match(&actual, &case.expected_output) {
            Ok(entry(true, Some(actual), None, Some(out.elapsed_ms)))
        } else {
            Ok(entry(
                false,
                Some(actual),
                Some("Output mismatch".to_string()),
                Some(out.elapsed_ms),
            ))
        }
    }

    /// Judge a submission against test cases held by an external store.
    /// The result shape is `judge`'s, unchanged.
    pub async fn judge_from_store(
        &self,
        loader: &dyn TestCaseLoader,
        request: &JudgeFileRequest,
        identifier: &str,
    ) -> Result<JudgeResponse, JudgeError> {
        let stored = loader
            .load_test_cases(&request.room_id, &request.question_id, request.include_private)
            .await
            .map_err(|e| JudgeError::Validation {
                code: ErrorCode::InvalidCode,
                reason: format!("Failed to load test cases: {e}"),
            })?;

        let test_cases = stored
            .into_iter()
            .map(|case| TestCase {
                input: case.input,
                expected_output: case.expected_output,
            })
            .collect();

        let judge_request = JudgeRequest {
            code: request.code.clone(),
            test_cases,
            time_limit_ms: request.time_limit_ms,
            memory_limit_mb: request.memory_limit_mb,
            optimization: request.optimization,
        };

        self.judge(&judge_request, identifier).await
    }

    async fn acquire_container(&self) -> Result<String, JudgeError> {
        self.pool.next_container().await.map_err(|e| {
            error!("Failed to acquire sandbox container: {}", e);
            JudgeError::Container(e.to_string())
        })
    }

    /// Best-effort removal of request-scoped files. Never blocks the caller
    /// and never changes the caller-visible result.
    fn spawn_cleanup(&self, container: String, wid: String) {
        let docker = self.docker.clone();
        let timeout_ms = self.config.cleanup_timeout_ms;
        tokio::spawn(async move {
            let limits = ExecLimits {
                time_limit_ms: timeout_ms,
                max_stdout_bytes: 4096,
                max_stderr_bytes: 4096,
                kill_pattern: None,
            };
            let env = vec![format!("CJUDGE_WID={wid}")];
            if let Err(e) =
                exec_with_limits(&docker, &container, shell(CLEANUP_SCRIPT), env, None, &limits)
                    .await
            {
                warn!("Workspace cleanup failed in {}: {}", container, e);
            }
        });
    }
}

/// Environment entries plus the stdin payload for the combined exec. The
/// encoded source travels on the exec's attached stdin: the kernel caps a
/// single execve env string at 128 KiB, well below the 1 MiB source
/// allowance. Program stdin is validated at 10 KiB so its env entry fits.
fn combined_exec_inputs(
    request: &CompileRequest,
    wid: &str,
    time_limit_ms: u64,
    opt: OptLevel,
) -> (Vec<String>, String) {
    let mut env = vec![
        format!("CJUDGE_WID={wid}"),
        format!(
            "CJUDGE_IN_B64={}",
            BASE64_STANDARD.encode(request.stdin.as_deref().unwrap_or(""))
        ),
        format!("CJUDGE_OPT={}", opt.gcc_flag()),
        format!("CJUDGE_TSEC={}", format_seconds(time_limit_ms)),
    ];
    if let Some(mb) = request.memory_limit_mb {
        env.push(format!("CJUDGE_MEMKB={}", mb * 1024));
    }
    (env, BASE64_STANDARD.encode(&request.code))
}

fn shell(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn format_seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn fixed_error(code: ErrorCode) -> JudgeError {
    JudgeError::Compiler {
        code,
        message: code.message().to_string(),
        details: None,
        line: None,
        column: None,
    }
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trimmed exact equality, the judge's pass criterion.
fn outputs_match(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

#[derive(Debug, PartialEq, Eq)]
struct CompileMarker {
    status: i32,
    compile_ms: u64,
    program_output: String,
}

/// Split the combined stdout stream at the compile sentinel. Everything
/// after the marker line is the program's own stdout.
fn split_compile_marker(stdout: &str) -> Option<CompileMarker> {
    let start = stdout.find(COMPILE_MARKER)?;
    let after = &stdout[start + COMPILE_MARKER.len()..];
    let (fields, rest) = match after.find('\n') {
        Some(pos) => (&after[..pos], &after[pos + 1..]),
        None => (after, ""),
    };

    let mut parts = fields.trim().splitn(2, ':');
    let status = parts.next()?.parse().ok()?;
    let compile_ms = parts.next()?.parse().ok()?;

    Some(CompileMarker {
        status,
        compile_ms,
        program_output: rest.to_string(),
    })
}

/// Classify a non-zero program exit. Shells report signal deaths as
/// 128+signo; `timeout -s KILL` makes 137 ambiguous between a timeout kill
/// and the kernel OOM killer, disambiguated by elapsed time.
fn run_failure(exit_code: i64, stderr: &str, run_ms: u64, limit_ms: u64) -> JudgeError {
    let lower = stderr.to_lowercase();
    let code = match exit_code {
        139 => ErrorCode::SegmentationFault,
        136 => ErrorCode::FloatingPointException,
        124 => ErrorCode::TimeLimitExceeded,
        137 => {
            if run_ms + 50 >= limit_ms {
                ErrorCode::TimeLimitExceeded
            } else {
                ErrorCode::MemoryLimitExceeded
            }
        }
        _ if lower.contains("segmentation fault") => ErrorCode::SegmentationFault,
        _ if lower.contains("floating point exception") => ErrorCode::FloatingPointException,
        _ if lower.contains("out of memory") || lower.contains("cannot allocate") => {
            ErrorCode::MemoryLimitExceeded
        }
        _ => ErrorCode::RuntimeError,
    };

    JudgeError::Compiler {
        code,
        message: code.message().to_string(),
        details: non_empty_trimmed(&classify::sanitize(stderr)),
        line: None,
        column: None,
    }
}

/// Classify compiler diagnostics into the compile-time taxonomy, with the
/// first offending line and column attached.
fn compile_error_from(stderr: &str) -> JudgeError {
    let code = match classify::classify(stderr) {
        code @ (ErrorCode::CompilationError
        | ErrorCode::SyntaxError
        | ErrorCode::DeclarationError
        | ErrorCode::TypeMismatchError
        | ErrorCode::ScopeError) => code,
        // Anything else means the text did not look like compiler output.
        _ => ErrorCode::CompilationError,
    };
    let diag = classify::parse_diagnostic(stderr);

    JudgeError::Compiler {
        code,
        message: code.message().to_string(),
        details: non_empty_trimmed(&classify::sanitize(stderr)),
        line: diag.line,
        column: diag.column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_splits_compiler_and_program_output() {
        let stdout = "__CJUDGE_COMPILE__:0:42\n12\n";
        let marker = split_compile_marker(stdout).unwrap();
        assert_eq!(marker.status, 0);
        assert_eq!(marker.compile_ms, 42);
        assert_eq!(marker.program_output, "12\n");
    }

    #[test]
    fn marker_handles_failure_without_program_output() {
        let marker = split_compile_marker("__CJUDGE_COMPILE__:1:317\n").unwrap();
        assert_eq!(marker.status, 1);
        assert_eq!(marker.compile_ms, 317);
        assert_eq!(marker.program_output, "");
    }

    #[test]
    fn marker_missing_or_garbled_is_none() {
        assert!(split_compile_marker("plain program output").is_none());
        assert!(split_compile_marker("__CJUDGE_COMPILE__:notanumber:5\n").is_none());
    }

    #[test]
    fn marker_tolerates_missing_trailing_newline() {
        let marker = split_compile_marker("__CJUDGE_COMPILE__:0:10").unwrap();
        assert_eq!(marker.compile_ms, 10);
        assert_eq!(marker.program_output, "");
    }

    #[test]
    fn output_comparison_ignores_surrounding_whitespace() {
        assert!(outputs_match("12\n", "12"));
        assert!(outputs_match("  hello ", "hello"));
        assert!(!outputs_match("12", "13"));
        // Interior whitespace still matters.
        assert!(!outputs_match("a b", "ab"));
    }

    #[test]
    fn run_failure_maps_signal_exits() {
        assert_eq!(run_failure(139, "", 10, 2000).code(), ErrorCode::SegmentationFault);
        assert_eq!(
            run_failure(136, "", 10, 2000).code(),
            ErrorCode::FloatingPointException
        );
        assert_eq!(run_failure(124, "", 2100, 2000).code(), ErrorCode::TimeLimitExceeded);
        assert_eq!(run_failure(1, "boom", 10, 2000).code(), ErrorCode::RuntimeError);
    }

    #[test]
    fn kill_exit_is_disambiguated_by_elapsed_time() {
        // Killed right at the limit: the timeout guard fired.
        assert_eq!(run_failure(137, "", 2000, 2000).code(), ErrorCode::TimeLimitExceeded);
        // Killed well before the limit: the OOM killer fired.
        assert_eq!(run_failure(137, "", 300, 2000).code(), ErrorCode::MemoryLimitExceeded);
    }

    #[test]
    fn run_failure_falls_back_to_stderr_text() {
        assert_eq!(
            run_failure(2, "Segmentation fault (core dumped)", 5, 2000).code(),
            ErrorCode::SegmentationFault
        );
        assert_eq!(
            run_failure(2, "mmap: Cannot allocate memory", 5, 2000).code(),
            ErrorCode::MemoryLimitExceeded
        );
    }

    #[test]
    fn compile_errors_stay_in_the_compile_taxonomy() {
        let err = compile_error_from("src_0123456789abcdef0123456789abcdef.c:4:5: error: expected ';' before 'return'");
        assert_eq!(err.code(), ErrorCode::SyntaxError);
        let (line, column) = err.line_column();
        assert_eq!(line, Some(4));
        assert_eq!(column, Some(5));
        // Workspace names never leak into details.
        assert!(!err.details().unwrap().contains("0123456789abcdef"));

        // Text that does not look like compiler output degrades to the
        // generic compile tag rather than a runtime tag.
        let err = compile_error_from("collect2 returned nonsense");
        assert_eq!(err.code(), ErrorCode::CompilationError);
    }

    #[test]
    fn seconds_format_for_the_timeout_guard() {
        assert_eq!(format_seconds(2500), "2.500");
        assert_eq!(format_seconds(100), "0.100");
        assert_eq!(format_seconds(30000), "30.000");
    }

    #[test]
    fn large_sources_travel_on_stdin_not_env() {
        // A maximal request: 1 MiB of source and 10 KiB of program stdin.
        let request = CompileRequest {
            code: "x".repeat(1024 * 1024),
            stdin: Some("y".repeat(10 * 1024)),
            time_limit_ms: Some(2000),
            memory_limit_mb: Some(256),
            optimization: None,
        };
        let (env, source_b64) = combined_exec_inputs(&request, "feedface", 2000, OptLevel::O2);

        // Each env string must fit the kernel's 128 KiB per-entry cap with
        // plenty of headroom.
        for entry in &env {
            assert!(entry.len() < 64 * 1024, "oversized env entry: {} bytes", entry.len());
        }
        // The source rides on the attached stdin instead.
        assert_eq!(source_b64, BASE64_STANDARD.encode(&request.code));
        assert!(env.iter().any(|e| e == "CJUDGE_WID=feedface"));
        assert!(env.iter().any(|e| e == "CJUDGE_OPT=-O2"));
        assert!(env.iter().any(|e| e == "CJUDGE_TSEC=2.000"));
        assert!(env.iter().any(|e| e == "CJUDGE_MEMKB=262144"));
    }

    #[test]
    fn memory_cap_env_is_omitted_when_unset() {
        let request = CompileRequest {
            code: "int main(void){return 0;}".to_string(),
            stdin: None,
            time_limit_ms: None,
            memory_limit_mb: None,
            optimization: None,
        };
        let (env, _) = combined_exec_inputs(&request, "cafebabe", 5000, OptLevel::O0);
        assert!(!env.iter().any(|e| e.starts_with("CJUDGE_MEMKB=")));
    }
}
