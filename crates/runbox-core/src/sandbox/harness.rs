//! Trusted Python harness wrapped around guest code.
//!
//! The harness parses the guest script, executes it, evaluates a trailing
//! expression, and reports through a side channel on stderr:
//! uncaught faults are prefixed with [`ERROR_PREFIX`], a non-`None` trailing
//! value with [`RETURN_PREFIX`]. In restricted mode the guest namespace only
//! sees an enumerated set of built-ins and a guarded `__import__`.

use crate::cleanup::Workspace;
use crate::config::SandboxConfig;
use crate::error::SandboxResult;
use crate::models::ExecutionRequest;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const ERROR_PREFIX: &str = "[[runbox:error]] ";
pub const RETURN_PREFIX: &str = "[[runbox:return]] ";

pub const HARNESS_FILE: &str = "_runbox_harness.py";
pub const POLICY_FILE: &str = "_runbox_policy.json";
pub const STDIN_FILE: &str = "_runbox_stdin.txt";
pub const CODE_FILE: &str = "main.py";

const HARNESS_SOURCE: &str = r#"import ast
import builtins
import json
import sys
import traceback

ERROR_PREFIX = "[[runbox:error]] "
RETURN_PREFIX = "[[runbox:return]] "

SAFE_BUILTINS = (
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes",
    "callable", "chr", "classmethod", "complex", "dict", "dir", "divmod",
    "enumerate", "filter", "float", "format", "frozenset", "hasattr", "hash",
    "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "map", "max", "min", "next", "object", "oct", "ord", "pow", "print",
    "property", "range", "repr", "reversed", "round", "set", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "zip",
    "__build_class__", "NotImplemented", "Ellipsis",
    "BaseException", "Exception", "ArithmeticError", "AssertionError",
    "AttributeError", "EOFError", "FloatingPointError", "GeneratorExit",
    "ImportError", "IndexError", "KeyError", "LookupError", "MemoryError",
    "ModuleNotFoundError", "NameError", "NotImplementedError", "OverflowError",
    "RecursionError", "RuntimeError", "StopAsyncIteration", "StopIteration",
    "TypeError", "UnboundLocalError", "UnicodeError", "ValueError",
    "ZeroDivisionError", "Warning", "UserWarning", "DeprecationWarning",
)


def guarded_import(allowed):
    real_import = builtins.__import__

    def _import(name, globals=None, locals=None, fromlist=(), level=0):
        if level:
            raise ImportError("Relative imports are not allowed in this sandbox")
        if name.split(".")[0] not in allowed:
            raise ImportError("Import of module '%s' is not allowed in this sandbox" % name)
        return real_import(name, globals, locals, fromlist, level)

    return _import


def safe_getattr(obj, name, *default):
    if isinstance(name, str) and name.startswith("__"):
        raise AttributeError("Access to attribute '%s' is not allowed" % name)
    return getattr(obj, name, *default)


def restricted_namespace(policy):
    table = {name: getattr(builtins, name) for name in SAFE_BUILTINS if hasattr(builtins, name)}
    table["getattr"] = safe_getattr
    table["__import__"] = guarded_import(frozenset(policy["allowed_imports"]))
    namespace = {"__name__": "__main__", "__builtins__": table}
    for module in policy["preloaded_modules"]:
        try:
            namespace[module] = __import__(module)
        except ImportError:
            pass
    return namespace


def report(exc):
    sys.stdout.flush()
    for chunk in traceback.format_exception_only(type(exc), exc):
        for line in chunk.rstrip("\n").splitlines():
            sys.stderr.write(ERROR_PREFIX + line + "\n")
    sys.stderr.flush()


def main():
    code_path, policy_path = sys.argv[1], sys.argv[2]
    with open(policy_path, encoding="utf-8") as handle:
        policy = json.load(handle)
    with open(code_path, encoding="utf-8") as handle:
        source = handle.read()
    if policy.get("stdin_path"):
        sys.stdin = open(policy["stdin_path"], encoding="utf-8")

    try:
        tree = ast.parse(source, filename="main.py")
    except SyntaxError as exc:
        report(exc)
        return 1

    trailing = None
    if tree.body and isinstance(tree.body[-1], ast.Expr):
        trailing = ast.Expression(tree.body.pop().value)

    if policy["restricted"]:
        namespace = restricted_namespace(policy)
    else:
        namespace = {"__name__": "__main__"}

    try:
        exec(compile(tree, "main.py", "exec"), namespace)
        if trailing is not None:
            value = eval(compile(trailing, "main.py", "eval"), namespace)
            if value is not None:
                sys.stdout.flush()
                sys.stderr.write(RETURN_PREFIX + repr(value).replace("\n", "\\n") + "\n")
    except SystemExit as exc:
        sys.stdout.flush()
        if exc.code is None:
            return 0
        return exc.code if isinstance(exc.code, int) else 1
    except BaseException as exc:
        report(exc)
        return 1
    sys.stdout.flush()
    return 0


if __name__ == "__main__":
    sys.exit(main())
"#;

/// Parameters the harness reads from its policy file
#[derive(Debug, Clone, Serialize)]
pub struct HarnessPolicy {
    pub restricted: bool,
    pub allowed_imports: Vec<String>,
    pub preloaded_modules: Vec<String>,
    pub stdin_path: Option<String>,
}

impl HarnessPolicy {
    pub fn new(config: &SandboxConfig, restricted: bool) -> Self {
        Self {
            restricted,
            allowed_imports: config.allowed_imports.clone(),
            preloaded_modules: config.preloaded_modules.clone(),
            stdin_path: None,
        }
    }
}

/// Paths of the staged files as the interpreter will see them
#[derive(Debug, Clone)]
pub struct StagedScript {
    pub harness: PathBuf,
    pub code: PathBuf,
    pub policy: PathBuf,
}

impl StagedScript {
    /// Interpreter arguments: isolated, unbuffered, UTF-8 mode
    pub fn interpreter_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-I", "-B", "-u", "-X", "utf8"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for path in [&self.harness, &self.code, &self.policy] {
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

/// Write guest code, harness and policy into `workspace`.
///
/// `guest_root` is where the workspace will be visible to the interpreter
/// (the host path for the local backend, the mount point for containers).
pub fn stage(
    workspace: &Workspace,
    request: &ExecutionRequest,
    mut policy: HarnessPolicy,
    guest_root: &Path,
    stdin_via_file: bool,
) -> SandboxResult<StagedScript> {
    workspace.write_file(CODE_FILE, &request.code)?;
    workspace.write_file(HARNESS_FILE, HARNESS_SOURCE)?;

    if stdin_via_file {
        if let Some(input) = &request.input_data {
            workspace.write_file(STDIN_FILE, input)?;
            policy.stdin_path = Some(guest_root.join(STDIN_FILE).to_string_lossy().into_owned());
        }
    }
    workspace.write_file(POLICY_FILE, &serde_json::to_string(&policy)?)?;

    Ok(StagedScript {
        harness: guest_root.join(HARNESS_FILE),
        code: guest_root.join(CODE_FILE),
        policy: guest_root.join(POLICY_FILE),
    })
}

/// Captured streams split into program output and side-channel records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideChannel {
    /// stdout followed by non-marker stderr lines
    pub output: String,
    /// Fault text, one line per reported line
    pub fault: Option<String>,
    pub return_value: Option<String>,
}

impl SideChannel {
    pub fn parse(stdout: &str, stderr: &str) -> Self {
        let mut output = stdout.to_string();
        let mut fault_lines = Vec::new();
        let mut return_value = None;

        for line in stderr.lines() {
            if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
                fault_lines.push(rest);
            } else if let Some(rest) = line.strip_prefix(RETURN_PREFIX) {
                return_value = Some(rest.to_string());
            } else {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(line);
                output.push('\n');
            }
        }

        Self {
            output,
            fault: (!fault_lines.is_empty()).then(|| fault_lines.join("\n")),
            return_value,
        }
    }

    /// Last reported line of the fault, normally `Type: message`
    pub fn fault_summary(&self) -> Option<&str> {
        self.fault.as_deref().and_then(|f| f.lines().last())
    }
}
