//! Glob-pattern ignore filter (C7 part 1).
//!
//! Grounded on `detectors::base::{compile_glob_patterns, should_exclude_path}`
//! (regex-compiled glob matching against relative path and basename); the
//! teacher uses this to skip known build/test noise from detector scans, we
//! use it identically to skip VCS/IDE/build-output directories during
//! discovery. This is a plain pattern filter, not `ignore`'s `.gitignore`
//! semantics — the `ignore` crate is used only as a directory walker in
//! `discovery::walker`.

use regex::Regex;

/// Patterns covering common VCS, IDE, build-output, and target directories
/// (spec.md §4.6).
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/.svn/**",
    "**/.hg/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/target/**",
    "**/build/**",
    "**/out/**",
    "**/node_modules/**",
    "**/.analysis/**",
];

#[derive(Debug, thiserror::Error)]
pub enum IgnoreFilterError {
    #[error("invalid ignore pattern '{0}': {1}")]
    InvalidPattern(String, regex::Error),
}

struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Compiles glob patterns (`*`, `**`, trailing `/`) into regexes once, then
/// matches cheaply against both the project-relative path and the basename;
/// a hit on either excludes (spec.md §4.6).
pub struct IgnoreFilter {
    patterns: Vec<CompiledPattern>,
}

impl IgnoreFilter {
    pub fn new(patterns: &[&str]) -> Result<Self, IgnoreFilterError> {
        let compiled = patterns
            .iter()
            .map(|p| compile_glob_pattern(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: compiled })
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS).expect("default patterns are valid")
    }

    pub fn extend(&mut self, extra: &[&str]) -> Result<(), IgnoreFilterError> {
        for p in extra {
            self.patterns.push(compile_glob_pattern(p)?);
        }
        Ok(())
    }

    /// `relative_path` uses `/`-separated components regardless of host OS.
    pub fn should_exclude(&self, relative_path: &str) -> bool {
        let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
        self.patterns
            .iter()
            .any(|p| p.regex.is_match(relative_path) || p.regex.is_match(basename))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.source.as_str())
    }
}

fn compile_glob_pattern(pattern: &str) -> Result<CompiledPattern, IgnoreFilterError> {
    let mut regex_str = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex_str.push_str(".*");
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                } else {
                    regex_str.push_str("[^/]*");
                }
            }
            '?' => regex_str.push_str("[^/]"),
            '.' | '(' | ')' | '+' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                regex_str.push('\\');
                regex_str.push(c);
            }
            other => regex_str.push(other),
        }
    }
    regex_str.push('$');
    let regex = Regex::new(&regex_str)
        .map_err(|e| IgnoreFilterError::InvalidPattern(pattern.to_string(), e))?;
    Ok(CompiledPattern {
        source: pattern.to_string(),
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_exclude_common_noise() {
        let filter = IgnoreFilter::with_defaults();
        assert!(filter.should_exclude("project/.git/HEAD"));
        assert!(filter.should_exclude("project/target/debug/foo"));
        assert!(filter.should_exclude("project/node_modules/left-pad/index.js"));
        assert!(!filter.should_exclude("project/src/Main.java"));
    }

    #[test]
    fn matches_basename_as_well_as_full_path() {
        let filter = IgnoreFilter::new(&["*.class"]).unwrap();
        assert!(filter.should_exclude("root/out/com/x/Y.class"));
        assert!(!filter.should_exclude("root/src/Main.java"));
    }

    #[test]
    fn double_star_matches_any_depth() {
        let filter = IgnoreFilter::new(&["**/test/**"]).unwrap();
        assert!(filter.should_exclude("root/src/test/java/FooTest.java"));
        assert!(!filter.should_exclude("root/src/main/java/Foo.java"));
    }
}
