//! Default security rules for Python and TypeScript
//!
//! This module contains the built-in rules used when validating generated
//! and user-supplied code.

use super::rules::SecurityRule;
use super::types::{SecurityIssueType, SecuritySeverity};
use execlite_core::Language;

const PY: &[Language] = &[Language::Python];
const TS: &[Language] = &[Language::TypeScript];

/// Get default Python security rules with improved patterns to reduce false positives
pub fn get_default_python_rules() -> Vec<SecurityRule> {
    vec![
        // ========================================================================
        // File Operations
        // ========================================================================
        // Use word boundary to avoid matching method calls like `file.open()`
        SecurityRule::new(
            "py-file-open",
            r"(?:^|[^.\w])open\s*\(",
            SecurityIssueType::FileOperation,
            SecuritySeverity::Medium,
            "Built-in open() function detected (file operation)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-file-delete",
            r"os\.(?:remove|unlink)|shutil\.rmtree",
            SecurityIssueType::FileOperation,
            SecuritySeverity::High,
            "File deletion operation",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-dir-list",
            r"os\.(?:listdir|walk)|glob\.glob|pathlib\.Path(?:\([^)]*\))?\.iterdir",
            SecurityIssueType::FileOperation,
            SecuritySeverity::Medium,
            "Directory listing operation",
        )
        .for_languages(PY),
        // ========================================================================
        // Network Operations
        // ========================================================================
        SecurityRule::new(
            "py-net-import",
            r"^\s*(?:import|from)\s+(?:socket|urllib|requests|http|httpx|aiohttp)\b",
            SecurityIssueType::NetworkRequest,
            SecuritySeverity::Medium,
            "Network library import",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-net-request",
            r"(?:urlopen|requests\.(?:get|post|put|delete|patch)|socket\.connect|httpx\.\w+)\s*\(",
            SecurityIssueType::NetworkRequest,
            SecuritySeverity::Medium,
            "Network request",
        )
        .for_languages(PY),
        // ========================================================================
        // Code Injection - Critical Patterns
        // ========================================================================
        SecurityRule::new(
            "py-eval",
            r"(?:^|[^.\w])eval\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "eval() function - arbitrary code execution",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-exec",
            r"(?:^|[^.\w])exec\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "exec() function - arbitrary code execution",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-compile",
            r"(?:^|[^.\w])compile\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::High,
            "compile() function - code compilation",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-unsafe-deserialize",
            r"(?:pickle|marshal)\.loads?\s*\(|yaml\.(?:load|unsafe_load)\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::High,
            "Unsafe deserialization (potential code execution)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-introspection-escape",
            r"__(?:subclasses|globals|bases|base|mro|code|closure|getattribute)__",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "Interpreter introspection commonly used to escape restricted scopes",
        )
        .for_languages(PY),
        // ========================================================================
        // Process Execution
        // ========================================================================
        SecurityRule::new(
            "py-subprocess",
            r"subprocess\.(?:call|run|Popen|check_output|check_call|getoutput)\s*\(",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Subprocess execution",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-os-system",
            r"os\.(?:system|popen|exec[lv]p?e?|spawn[lv]?p?e?|posix_spawnp?|fork(?:pty)?)\s*\(",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "OS command execution",
        )
        .for_languages(PY),
        // `os` re-exports these; calling them directly skips the `os.` prefix
        SecurityRule::new(
            "py-posix-call",
            r"(?:^|[^.\w])(?:posix|nt|pty|_posixsubprocess|_winapi)\.\w+\s*\(",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Low-level process module call",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-exec-from-import",
            r"^\s*from\s+(?:os|posix|nt|pty|subprocess|_posixsubprocess)\s+import\s+.*\b(?:system|popen|spawn\w*|exec[lv]\w*|posix_spawnp?|fork\w*|fork_exec|Popen|run|call|check_output|check_call|getoutput)\b",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Process execution function imported by name",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-module-alias",
            r"^\s*import\s+(?:os|posix|nt|pty|subprocess|_posixsubprocess)\s+as\b|getattr\s*\(\s*(?:os|posix|nt|pty|subprocess|_posixsubprocess)\s*,",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Process-capable module reached through an alias",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-sys-modules-lookup",
            r"sys\.modules\s*(?:\[|\.get\s*\()",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "Module lookup through sys.modules",
        )
        .for_languages(PY),
        // ========================================================================
        // Memory Bombs
        // ========================================================================
        SecurityRule::new(
            "py-large-array",
            r#"\[\s*(?:0|None|''|"")\s*\]\s*\*\s*\d{7,}"#,
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::High,
            "Large array allocation (potential memory bomb)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-large-range",
            r"list\s*\(\s*range\s*\(\s*\d{8,}",
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::High,
            "Large range allocation (potential memory bomb)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-large-bytes",
            r"(?:bytearray|bytes)\s*\(\s*\d{8,}\s*\)",
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::High,
            "Large byte allocation (potential memory bomb)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-infinite-loop",
            r"while\s+True\s*:",
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::Medium,
            "Potential infinite loop",
        )
        .for_languages(PY),
        // ========================================================================
        // Dynamic Imports
        // ========================================================================
        SecurityRule::new(
            "py-dynamic-import",
            r"__import__\s*\(|importlib\.import_module\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "Dynamic import (bypasses static analysis)",
        )
        .for_languages(PY),
        // ========================================================================
        // System Information Access
        // ========================================================================
        SecurityRule::new(
            "py-env-access",
            r"os\.(?:environ|getenv|putenv)",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Medium,
            "Environment variable access",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-platform-info",
            r"platform\.(?:system|version|platform|machine|node)",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Medium,
            "System information access",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-sys-info",
            r"sys\.(?:path|modules|argv|version|executable)",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Low,
            "Python runtime information access",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-user-info",
            r"(?:pwd\.getpwuid|os\.(?:getuid|getgid|getlogin))",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Medium,
            "User/group information access",
        )
        .for_languages(PY),
        // ========================================================================
        // Built-in Function Modification
        // ========================================================================
        SecurityRule::new(
            "py-builtins",
            r"__builtins__",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::High,
            "Built-in scope access",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-scope-access",
            r"(?:globals|locals|vars)\s*\(\s*\)",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::High,
            "Global/local scope access",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-builtins-modify",
            r"(?:(?:setattr|delattr)\s*\(\s*(?:__builtins__|builtins)\b|builtins\.\w+\s*=[^=])",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "Modification of built-in functions",
        )
        .for_languages(PY),
        // ========================================================================
        // Dangerous Module Imports
        // ========================================================================
        SecurityRule::new(
            "py-ctypes-import",
            r"^\s*import\s+ctypes|^\s*from\s+ctypes\s+import",
            SecurityIssueType::DangerousModule,
            SecuritySeverity::Critical,
            "ctypes import (allows arbitrary memory access)",
        )
        .for_languages(PY),
        SecurityRule::new(
            "py-os-import",
            r"^\s*import\s+(?:os|subprocess|shutil|pty|posix|nt|_posixsubprocess)\b|^\s*from\s+(?:os|subprocess|shutil|pty|posix|nt|_posixsubprocess)\b",
            SecurityIssueType::DangerousModule,
            SecuritySeverity::High,
            "System module import",
        )
        .for_languages(PY),
    ]
}

/// Get default TypeScript/Node.js security rules
pub fn get_default_typescript_rules() -> Vec<SecurityRule> {
    vec![
        // ========================================================================
        // Code Injection
        // ========================================================================
        SecurityRule::new(
            "js-eval",
            r"(?:^|[^.\w$])eval\s*\(|new\s+Function\s*\(",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "eval() or Function constructor - arbitrary code execution",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-constructor-escape",
            r#"\.\s*constructor\s*(?:\.\s*constructor\b|\()|\[\s*['"`]constructor['"`]\s*\]"#,
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "Constructor chain access (reaches the Function constructor)",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-vm-module",
            r#"(?:require\s*\(|import\s*\(|from)\s*['"](?:node:)?vm['"]"#,
            SecurityIssueType::CodeInjection,
            SecuritySeverity::Critical,
            "vm module import - arbitrary code execution",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-global-indexing",
            r"\b(?:globalThis|global|window|self)\s*\[",
            SecurityIssueType::CodeInjection,
            SecuritySeverity::High,
            "Computed global property access",
        )
        .for_languages(TS),
        // ========================================================================
        // Network Operations
        // ========================================================================
        SecurityRule::new(
            "js-fetch",
            r"\b(?:fetch|axios|got)\s*\(",
            SecurityIssueType::NetworkRequest,
            SecuritySeverity::Medium,
            "HTTP request",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-xhr",
            r"new\s+(?:XMLHttpRequest|WebSocket)\b|https?\.(?:request|get)\s*\(",
            SecurityIssueType::NetworkRequest,
            SecuritySeverity::Medium,
            "HTTP request",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-net-module",
            r#"(?:require\s*\(|import\s*\(|from)\s*['"](?:node:)?(?:net|http|https|http2|dgram|tls|dns)['"]"#,
            SecurityIssueType::NetworkRequest,
            SecuritySeverity::Medium,
            "Network module import",
        )
        .for_languages(TS),
        // ========================================================================
        // File Operations (Node.js)
        // ========================================================================
        SecurityRule::new(
            "js-fs-sync",
            r"fs\.(?:readFileSync|writeFileSync|appendFileSync|unlinkSync|rmdirSync|rmSync|readdirSync)\s*\(",
            SecurityIssueType::FileOperation,
            SecuritySeverity::Medium,
            "Synchronous file operation",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-fs-async",
            r"fs(?:Promises)?\.(?:readFile|writeFile|appendFile|unlink|rmdir|rm|readdir)\s*\(",
            SecurityIssueType::FileOperation,
            SecuritySeverity::Medium,
            "Asynchronous file operation",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-fs-module",
            r#"(?:require\s*\(|import\s*\(|from)\s*['"](?:node:)?fs(?:/promises)?['"]"#,
            SecurityIssueType::FileOperation,
            SecuritySeverity::Medium,
            "File system module import",
        )
        .for_languages(TS),
        // ========================================================================
        // Process Execution (Node.js)
        // ========================================================================
        SecurityRule::new(
            "js-child-process",
            r"child_process\.(?:exec|execSync|execFile|execFileSync|spawn|spawnSync|fork)\s*\(|\b(?:execSync|execFileSync|spawnSync)\s*\(",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Child process execution",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-child-process-module",
            r#"(?:require\s*\(|import\s*\(|from)\s*['"](?:node:)?(?:child_process|worker_threads|cluster)['"]"#,
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::High,
            "Child process module import",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-dynamic-require",
            r#"(?:^|[^.\w$])(?:require|import)\s*\(\s*[^'"\s)]"#,
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Module loaded from a computed name (bypasses static analysis)",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-module-loader",
            r"process\.mainModule|\bmodule\s*\.\s*(?:require|constructor)\b|\bcreateRequire\s*\(",
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Module loader access",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-computed-exec",
            r#"\[\s*['"`](?:exec|execSync|execFile|execFileSync|spawn|spawnSync|fork)['"`]\s*\]|\[\s*['"`][^\]]*['"`]\s*\+[^\]]*\]\s*\("#,
            SecurityIssueType::ProcessExecution,
            SecuritySeverity::Critical,
            "Computed member call that may reach process execution",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-process-indexing",
            r"\bprocess\s*\[",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Critical,
            "Computed property access on process",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-process-binding",
            r"process\.(?:binding|_linkedBinding|dlopen)\s*\(",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Critical,
            "Native binding access",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-env-access",
            r"process\.env\b",
            SecurityIssueType::SystemAccess,
            SecuritySeverity::Medium,
            "Environment variable access",
        )
        .for_languages(TS),
        // ========================================================================
        // Memory Bombs
        // ========================================================================
        SecurityRule::new(
            "js-large-array",
            r"new\s+Array\s*\(\s*\d{6,}\s*\)|Array\s*\(\s*\d{6,}\s*\)\.fill",
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::High,
            "Large array allocation (potential memory bomb)",
        )
        .for_languages(TS),
        SecurityRule::new(
            "js-infinite-loop",
            r"while\s*\(\s*true\s*\)|for\s*\(\s*;\s*;\s*\)",
            SecurityIssueType::MemoryBomb,
            SecuritySeverity::Medium,
            "Potential infinite loop",
        )
        .for_languages(TS),
    ]
}

/// Get all default security rules
pub fn get_default_rules() -> Vec<SecurityRule> {
    let mut rules = get_default_python_rules();
    rules.extend(get_default_typescript_rules());
    rules
}
