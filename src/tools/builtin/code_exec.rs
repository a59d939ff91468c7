//! execute_python tool - Python behind an isolation boundary
//!
//! The default boundary is bubblewrap: new namespaces with no network, a
//! root built from read-only system directories and an empty `/tmp`, and
//! the per-call work directory as the only host path the code can see.
//! CPU time, address space and file size are capped with rlimits in every
//! mode, on top of the wall-clock timeout. When no boundary can be set up
//! the tool is not registered.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::config::{SandboxMode, ToolsConfig};
use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::str_arg;

const SCRIPT_NAME: &str = "main.py";
const SAFE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Work directory as seen from inside bubblewrap
const SANDBOX_WORKDIR: &str = "/sandbox";

/// Host paths mounted read-only so the interpreter and its libraries load
const SYSTEM_DIRS: &[&str] = &[
    "/bin",
    "/sbin",
    "/lib",
    "/lib32",
    "/lib64",
    "/etc/alternatives",
    "/etc/ld.so.cache",
    "/etc/localtime",
];

/// Prints a `result` variable if the code defined one
const RESULT_EPILOGUE: &str = "\n\nif 'result' in globals():\n    print(f\"Result: {result}\")\n";

/// Resolved isolation boundary
#[derive(Debug, Clone, PartialEq)]
enum Isolation {
    Bubblewrap(PathBuf),
    Command(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ResourceLimits {
    memory_bytes: u64,
    cpu_secs: u64,
    file_size_bytes: u64,
}

/// Execute Python code out of process, isolated
pub struct ExecutePythonTool {
    python: String,
    isolation: Isolation,
    limits: ResourceLimits,
    timeout: Duration,
    max_output: usize,
}

impl ExecutePythonTool {
    /// The tool for `config`, or `None` when code cannot run isolated
    pub fn from_config(config: &ToolsConfig) -> Option<Self> {
        let sandbox = &config.sandbox;
        let isolation = match sandbox.mode {
            SandboxMode::Disabled => {
                info!("Code execution disabled, execute_python not registered");
                return None;
            }
            SandboxMode::Bubblewrap => match find_program(&sandbox.bwrap_path) {
                Some(bwrap) if bubblewrap_works(&bwrap) => Isolation::Bubblewrap(bwrap),
                Some(bwrap) => {
                    warn!(
                        "{} cannot create namespaces here, execute_python not registered",
                        bwrap.display()
                    );
                    return None;
                }
                None => {
                    warn!(
                        "bubblewrap ({}) not found, execute_python not registered",
                        sandbox.bwrap_path
                    );
                    return None;
                }
            },
            SandboxMode::Command if sandbox.command.is_empty() => {
                warn!("Sandbox mode is command but no command is set, execute_python not registered");
                return None;
            }
            SandboxMode::Command => Isolation::Command(sandbox.command.clone()),
        };

        Some(Self::with_isolation(config, isolation))
    }

    fn with_isolation(config: &ToolsConfig, isolation: Isolation) -> Self {
        const MB: u64 = 1024 * 1024;
        let sandbox = &config.sandbox;
        Self {
            python: config.python_command.clone(),
            isolation,
            limits: ResourceLimits {
                memory_bytes: sandbox.memory_limit_mb.saturating_mul(MB),
                cpu_secs: sandbox.cpu_limit_secs,
                file_size_bytes: sandbox.max_file_size_mb.saturating_mul(MB),
            },
            timeout: Duration::from_millis(config.code_execution_timeout_ms),
            max_output: config.code_execution_max_output,
        }
    }

    /// Describes what the boundary actually enforces
    pub fn spec(&self) -> ToolSpec {
        let boundary = match self.isolation {
            Isolation::Bubblewrap(_) => {
                "Runs in a sandbox with no network access and no access to host files; only the \
                 standard library and system-installed packages are available."
            }
            Isolation::Command(_) => "Runs inside the configured sandbox command.",
        };
        ToolSpec::new(
            "execute_python",
            ToolCategory::CodeExecution,
            format!(
                "Execute Python code for calculations, data processing and algorithmic tasks. {} \
                 CPU time is limited to {}s and memory to {} MB. Print what you need, or store \
                 the final value in a variable named 'result'. \
                 Example: 'result = sum(i**2 for i in range(10))'",
                boundary,
                self.limits.cpu_secs,
                self.limits.memory_bytes / (1024 * 1024)
            ),
        )
        .with_param(ParamSpec::required("code", ParamKind::String, "Python source code to run"))
    }

    fn argv(&self, workdir: &Path) -> Vec<OsString> {
        let interpreter = [self.python.as_str(), "-I", SCRIPT_NAME].map(OsString::from);
        match &self.isolation {
            Isolation::Bubblewrap(bwrap) => {
                let mut argv: Vec<OsString> = vec![bwrap.into()];
                let flags = ["--unshare-all", "--die-with-parent", "--new-session", "--ro-bind", "/usr", "/usr"];
                argv.extend(flags.map(OsString::from));
                for &dir in SYSTEM_DIRS {
                    argv.extend(["--ro-bind-try", dir, dir].map(OsString::from));
                }
                argv.extend(["--proc", "/proc", "--dev", "/dev", "--tmpfs", "/tmp", "--bind"].map(OsString::from));
                argv.push(workdir.into());
                argv.extend([SANDBOX_WORKDIR, "--chdir", SANDBOX_WORKDIR].map(OsString::from));
                argv.extend(interpreter);
                argv
            }
            Isolation::Command(prefix) => prefix.iter().map(OsString::from).chain(interpreter).collect(),
        }
    }

    fn command(&self, workdir: &Path) -> Command {
        let argv = self.argv(workdir);
        let home: &Path = match self.isolation {
            Isolation::Bubblewrap(_) => Path::new(SANDBOX_WORKDIR),
            Isolation::Command(_) => workdir,
        };

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(workdir)
            .env_clear()
            .env("PATH", SAFE_PATH)
            .env("PYTHONIOENCODING", "utf-8")
            .env("HOME", home)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_limits(&mut cmd, self.limits);
        cmd
    }

    fn cap(&self, mut output: String) -> String {
        if let Some((idx, _)) = output.char_indices().nth(self.max_output) {
            output.truncate(idx);
            output.push_str("\n... [output truncated]");
        }
        output
    }
}

/// Set rlimits in the child between fork and exec
#[cfg(unix)]
fn apply_limits(cmd: &mut Command, limits: ResourceLimits) {
    let set_limits = move || -> std::io::Result<()> {
        for (resource, value) in [
            (libc::RLIMIT_AS, limits.memory_bytes),
            (libc::RLIMIT_CPU, limits.cpu_secs),
            (libc::RLIMIT_FSIZE, limits.file_size_bytes),
        ] {
            let limit = libc::rlimit {
                rlim_cur: value as libc::rlim_t,
                rlim_max: value as libc::rlim_t,
            };
            // SAFETY: setrlimit only reads `limit`
            if unsafe { libc::setrlimit(resource, &limit) } != 0 {
                return Err(std::io::Error::last_os_error());
            }
        }
        Ok(())
    };
    // SAFETY: the hook only calls setrlimit, which is async-signal-safe
    unsafe {
        cmd.pre_exec(set_limits);
    }
}

#[cfg(not(unix))]
fn apply_limits(_cmd: &mut Command, _limits: ResourceLimits) {}

/// Resolve `program` the way a shell would
fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let dirs = std::env::var_os("PATH")?;
    std::env::split_paths(&dirs)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Whether bubblewrap can create its namespaces on this host
fn bubblewrap_works(bwrap: &Path) -> bool {
    let status = std::process::Command::new(bwrap)
        .args(["--unshare-all", "--ro-bind", "/", "/", "true"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    matches!(status, Ok(status) if status.success())
}

#[async_trait]
impl ToolHandler for ExecutePythonTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let code = str_arg(&arguments, "code")?;
        if code.trim().is_empty() {
            return Err(ToolFailure::invalid_arguments("code is empty"));
        }

        let workdir = tempfile::tempdir()
            .map_err(|e| ToolFailure::internal(format!("Failed to create temp dir: {}", e)))?;
        let script = format!("{}{}", code, RESULT_EPILOGUE);
        tokio::fs::write(workdir.path().join(SCRIPT_NAME), script)
            .await
            .map_err(|e| ToolFailure::internal(format!("Failed to write script: {}", e)))?;

        debug!("Executing Python code ({} bytes)", code.len());
        let child = self
            .command(workdir.path())
            .spawn()
            .map_err(|e| ToolFailure::internal(format!("Failed to spawn {}: {}", self.python, e)))?;

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolFailure::internal(format!("IO error: {}", e))),
            Err(_) => {
                warn!("Python execution timed out after {}ms", self.timeout.as_millis());
                return Err(ToolFailure::timeout(format!(
                    "code execution timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let text = if output.status.success() {
            match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
                (false, true) => format!("Output:\n{}", stdout),
                (false, false) => format!("Output:\n{}\n--- stderr ---\n{}", stdout, stderr),
                (true, false) => format!("Execution completed with warnings:\n{}", stderr),
                (true, true) => "Code executed successfully (no output)".to_string(),
            }
        } else {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "killed".to_string());
            let mut text = format!("Execution failed (exit status {})", status);
            if !stdout.is_empty() {
                text.push_str(&format!("\nOutput:\n{}", stdout));
            }
            text.push_str(&format!("\n--- stderr ---\n{}", stderr));
            text
        };

        Ok(self.cap(text))
    }
}
