//! Leading-comment splitting: human description vs `+kubebuilder:` directives.
use regex::Regex;

use crate::error::ConfigError;

/// Directive lines start with this prefix (after trimming).
pub const DIRECTIVE_PREFIX: &str = "+kubebuilder:";

/// Blocks or lines starting with one of these never reach the description.
pub const EXCLUSION_MARKERS: [&str; 3] = ["$hide_from_docs", "$hide", "@exclude"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub description: String,
    pub directives: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnnotationParser {
    include_description: bool,
    multiline: bool,
    ignored: Option<Regex>,
}

impl Default for AnnotationParser {
    fn default() -> Self {
        Self { include_description: true, multiline: false, ignored: None }
    }
}

impl AnnotationParser {
    pub fn new<I, S>(include_description: bool, multiline: bool, ignored_substrings: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives = ignored_substrings
            .into_iter()
            .map(|s| regex::escape(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        let ignored = if alternatives.is_empty() {
            None
        } else {
            let src = format!("(?:{})", alternatives.join("|"));
            Some(Regex::new(&src).map_err(|e| ConfigError::IgnorePattern(e.to_string()))?)
        };
        Ok(Self { include_description, multiline, ignored })
    }

    /// Split a raw leading comment into the rendered description and the
    /// directive lines, in the order they appear.
    pub fn parse(&self, comments: &str) -> Annotation {
        let (full, directives) = self.split(comments);
        let description = if !self.include_description {
            String::new()
        } else if self.multiline {
            full
        } else {
            single_line(comments, &full)
        };
        Annotation { description, directives }
    }

    fn is_ignored(&self, line: &str) -> bool {
        self.ignored.as_ref().is_some_and(|rx| rx.is_match(line))
    }

    fn split(&self, comments: &str) -> (String, Vec<String>) {
        let mut directives = Vec::new();
        let mut blocks = Vec::new();

        for block in comments.trim().split("\n\n") {
            let hidden = is_excluded(block);
            let mut kept = Vec::new();
            for line in block.split('\n') {
                let trimmed = line.trim();
                if trimmed.starts_with(DIRECTIVE_PREFIX) && !self.is_ignored(trimmed) {
                    directives.push(trimmed.to_string());
                    continue;
                }
                if hidden || is_excluded(trimmed) {
                    continue;
                }
                kept.push(reflow(line));
            }
            if hidden {
                continue;
            }
            let text = kept.join("\n");
            if !text.trim().is_empty() {
                blocks.push(text);
            }
        }

        (blocks.join("\n\n").trim().to_string(), directives)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn is_excluded(text: &str) -> bool {
    let text = text.trim();
    EXCLUSION_MARKERS.iter().any(|m| text.starts_with(m))
}

// protoc keeps the space after `//`; drop exactly one.
fn reflow(line: &str) -> &str {
    line.strip_prefix(' ').unwrap_or(line).trim_end()
}

/// First paragraph, whitespace collapsed. A hidden leading paragraph in the
/// raw comment hides the summary rather than promoting the next one.
fn single_line(raw: &str, full: &str) -> String {
    let raw_first = raw.trim().split("\n\n").next().unwrap_or_default();
    let first = full.split("\n\n").next().unwrap_or_default();
    if raw_first.starts_with('$') || first.starts_with('$') {
        return String::new();
    }
    first.split_whitespace().collect::<Vec<_>>().join(" ")
}
