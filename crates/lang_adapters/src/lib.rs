//! Language adapters: turn user source text into a compiled-and-run
//! [`sandbox_core::RunResult`] for a specific language family.
//!
//! Each adapter implements [`sandbox_core::Adapter`] and is registered with
//! the dispatcher under its canonical tag plus any aliases (`"c"` -> `c11`,
//! etc).

mod c_family;
mod go_style;
mod shell;
mod toolchain;

pub use c_family::{C11Adapter, C89Adapter, C99Adapter};
pub use go_style::GoStyleAdapter;
pub use shell::ShellAdapter;

/// Matches `int main(` / `void main(` with arbitrary whitespace before the
/// parenthesis, used to decide whether user C source already defines an
/// entry point or needs to be compiled object-only.
pub(crate) fn has_c_entry_point(source: &str) -> bool {
    use regex::Regex;
    use std::sync::OnceLock;
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(int|void)\s+main\s*\(").expect("static regex is valid"))
        .is_match(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_int_main() {
        assert!(has_c_entry_point("int main(void) { return 0; }"));
    }

    #[test]
    fn detects_void_main_with_odd_spacing() {
        assert!(has_c_entry_point("void   main (int argc) {}"));
    }

    #[test]
    fn rejects_source_with_no_main() {
        assert!(!has_c_entry_point("int add(int a, int b) { return a + b; }"));
    }
}
