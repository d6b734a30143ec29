//! Runtime support scripts shipped with the sandbox.
//!
//! The prelude defines the tool bridge (`__callTool` / `__call_tool`) and the
//! `__summarize` / `__emit` helpers generated code relies on. The process tier
//! prepends it to the program; the VM tier loads it in the host script and
//! injects only the bridge functions into the isolated context.

use execlite_core::Language;
use std::path::Path;

pub const PRELUDE_JS: &str = include_str!("runtime/prelude.js");
pub const PRELUDE_PY: &str = include_str!("runtime/prelude.py");
pub const VM_HOST_JS: &str = include_str!("runtime/vm_host.js");
pub const VM_HOST_PY: &str = include_str!("runtime/vm_host.py");

pub fn prelude(language: Language) -> &'static str {
    match language {
        Language::TypeScript => PRELUDE_JS,
        Language::Python => PRELUDE_PY,
    }
}

/// File name of the prelude when written next to a VM host.
pub fn prelude_file(language: Language) -> &'static str {
    match language {
        Language::TypeScript => "prelude.js",
        Language::Python => "prelude.py",
    }
}

pub fn vm_host(language: Language) -> &'static str {
    match language {
        Language::TypeScript => VM_HOST_JS,
        Language::Python => VM_HOST_PY,
    }
}

pub fn vm_host_file(language: Language) -> &'static str {
    match language {
        Language::TypeScript => "vm_host.js",
        Language::Python => "vm_host.py",
    }
}

/// Program file name for direct execution. `.cts` keeps Node in CommonJS mode
/// so the prelude can `require`.
pub fn main_file(language: Language) -> &'static str {
    match language {
        Language::TypeScript => "main.cts",
        Language::Python => "main.py",
    }
}

/// Program file name for the VM tier.
pub fn program_file(language: Language) -> &'static str {
    match language {
        Language::TypeScript => "program.ts",
        Language::Python => "program.py",
    }
}

/// Prelude followed by the program, ready to run directly.
pub fn process_program(code: &str, language: Language) -> String {
    let prelude = prelude(language);
    let mut out = String::with_capacity(prelude.len() + code.len() + 1);
    out.push_str(prelude);
    if !prelude.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(code);
    out
}

/// Write the files a VM-tier run needs into `dir`; returns the program path.
pub fn write_vm_files(dir: &Path, code: &str, language: Language) -> std::io::Result<std::path::PathBuf> {
    std::fs::write(dir.join(prelude_file(language)), prelude(language))?;
    std::fs::write(dir.join(vm_host_file(language)), vm_host(language))?;
    let program = dir.join(program_file(language));
    std::fs::write(&program, code)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preludes_define_bridge() {
        assert!(PRELUDE_JS.contains("function __callTool("));
        assert!(PRELUDE_JS.contains("__EXECLITE_TOOL_CALL__"));
        assert!(PRELUDE_PY.contains("def __call_tool("));
        assert!(PRELUDE_PY.contains(crate::bridge::TOOL_CALL_MARKER));
        assert!(VM_HOST_JS.contains(prelude_file(Language::TypeScript)));
        assert!(VM_HOST_PY.contains(prelude_file(Language::Python)));
    }

    #[test]
    fn test_process_program_prepends_prelude() {
        let program = process_program("print(1)\n", Language::Python);
        assert!(program.starts_with(PRELUDE_PY));
        assert!(program.ends_with("print(1)\n"));
    }

    #[test]
    fn test_write_vm_files() {
        let dir = tempfile::tempdir().unwrap();
        let program = write_vm_files(dir.path(), "const a = 1;", Language::TypeScript).unwrap();
        assert!(program.ends_with("program.ts"));
        assert!(dir.path().join("vm_host.js").exists());
        assert!(dir.path().join("prelude.js").exists());
    }
}
