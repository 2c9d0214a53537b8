//! Standard library detection.
//!
//! Single source of truth for deciding whether an import path refers to the
//! Go standard library. A path is standard library iff its first segment is
//! on the fixed whitelist, the path contains no dot, and it is not under a
//! host-shared-library prefix.

/// Root segments of the standard library.
const STD_ROOTS: &[&str] = &[
    "archive", "bufio", "builtin", "bytes", "compress", "container", "context",
    "crypto", "database", "debug", "embed", "encoding", "errors", "expvar",
    "flag", "fmt", "go", "hash", "html", "image", "index", "io", "log",
    "math", "mime", "net", "os", "path", "plugin", "reflect", "regexp",
    "runtime", "sort", "strconv", "strings", "sync", "syscall", "testing",
    "text", "time", "unicode", "unsafe",
];

/// Module prefixes the toolchain hosts alongside the standard library but
/// that are ordinary modules for bundling purposes.
const HOST_PREFIXES: &[&str] = &["golang.org/x/"];

/// Check whether an import path refers to a standard library package.
pub fn is_std_import(path: &str) -> bool {
    if path.contains('.') {
        return false;
    }
    if HOST_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return false;
    }
    let root = path.split('/').next().unwrap_or(path);
    STD_ROOTS.binary_search(&root).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_is_sorted_for_binary_search() {
        let mut sorted = STD_ROOTS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STD_ROOTS);
    }

    #[test]
    fn detects_std_roots_and_subpackages() {
        assert!(is_std_import("fmt"));
        assert!(is_std_import("os"));
        assert!(is_std_import("math/rand"));
        assert!(is_std_import("container/heap"));
        assert!(is_std_import("log/slog"));
    }

    #[test]
    fn rejects_module_qualified_paths() {
        assert!(!is_std_import("github.com/user/repo/lib"));
        assert!(!is_std_import("example.com/m"));
    }

    #[test]
    fn rejects_host_prefixes() {
        assert!(!is_std_import("golang.org/x/tools/imports"));
    }

    #[test]
    fn rejects_unknown_roots() {
        assert!(!is_std_import("notstd"));
        assert!(!is_std_import("mylib/sub"));
    }
}
