/*!
 * Glob patterns matched against full absolute paths
 *
 * `*` and `?` stay within one path segment, `**` also crosses `/`.
 * Character classes (`[a-z]`) and alternatives (`{conf,cfg}`) are supported.
 * Patterns are validated once, up front, so a malformed pattern is reported
 * as a configuration error instead of silently matching nothing.
 */

use glob_match::glob_match;

use crate::error::Result;

/// A validated glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
}

impl Pattern {
    /// Validate and wrap a glob pattern
    pub fn new(raw: &str) -> Result<Self> {
        crate::ensure!(!raw.is_empty(), Pattern, "pattern is empty");

        let mut in_class = false;
        let mut brace_depth = 0usize;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if chars.next().is_none() {
                        crate::bail!(Pattern, "{}: trailing escape character", raw);
                    }
                }
                '[' if !in_class => {
                    in_class = true;
                    // `[]...]` and `[!]...]` treat the leading `]` as a literal
                    if chars.peek() == Some(&'!') || chars.peek() == Some(&'^') {
                        chars.next();
                    }
                    if chars.peek() == Some(&']') {
                        chars.next();
                    }
                }
                ']' if in_class => in_class = false,
                '{' if !in_class => brace_depth += 1,
                '}' if !in_class => {
                    if brace_depth == 0 {
                        crate::bail!(Pattern, "{}: unmatched '}}'", raw);
                    }
                    brace_depth -= 1;
                }
                _ => {}
            }
        }

        crate::ensure!(!in_class, Pattern, "{}: unterminated character class", raw);
        crate::ensure!(brace_depth == 0, Pattern, "{}: unterminated '{{'", raw);

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// Test a full path against the pattern
    pub fn matches(&self, path: &str) -> bool {
        glob_match(&self.raw, path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_star_crosses_directories() {
        let pattern = Pattern::new("/etc/**/*.conf").unwrap();

        assert!(pattern.matches("/etc/nginx/nginx.conf"));
        assert!(pattern.matches("/etc/nginx/conf.d/default.conf"));
        assert!(!pattern.matches("/usr/etc/nginx/nginx.conf"));
        assert!(!pattern.matches("/etc/nginx/nginx.conf.bak"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = Pattern::new("/etc/*.conf").unwrap();

        assert!(pattern.matches("/etc/host.conf"));
        assert!(!pattern.matches("/etc/nginx/nginx.conf"));
    }

    #[test]
    fn test_matches_full_path_not_basename() {
        let pattern = Pattern::new("*.conf").unwrap();

        assert!(!pattern.matches("/etc/host.conf"));
    }

    #[test]
    fn test_classes_and_alternatives() {
        let pattern = Pattern::new("/var/log/*.{log,txt}").unwrap();
        assert!(pattern.matches("/var/log/syslog.log"));
        assert!(pattern.matches("/var/log/notes.txt"));
        assert!(!pattern.matches("/var/log/notes.gz"));

        let pattern = Pattern::new("/dev/tty[0-9]").unwrap();
        assert!(pattern.matches("/dev/tty3"));
        assert!(!pattern.matches("/dev/ttyS"));
    }

    #[test]
    fn test_malformed_patterns_are_rejected() {
        assert!(Pattern::new("").is_err());
        assert!(Pattern::new("/etc/[abc").is_err());
        assert!(Pattern::new("/etc/{a,b").is_err());
        assert!(Pattern::new("/etc/a,b}").is_err());
        assert!(Pattern::new("/etc/foo\\").is_err());
    }

    #[test]
    fn test_bracket_literal_forms_are_accepted() {
        assert!(Pattern::new("/tmp/[]]").is_ok());
        assert!(Pattern::new("/tmp/[!]x]").is_ok());
        assert!(Pattern::new("/tmp/\\[literal\\]").is_ok());
    }
}
