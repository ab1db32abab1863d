pub const DEFAULT_TARGET_TRIPLE: &str = "x86_64-pc-linux-gnu";

/// Compiler settings. A `None` field is unset at this layer and falls back
/// to the layer below it, ending at the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub target_triple: Option<String>,
}

impl Config {
    pub fn with_target(triple: impl Into<String>) -> Self {
        Config {
            target_triple: Some(triple.into()),
        }
    }

    pub fn target_triple(&self) -> &str {
        self.target_triple.as_deref().unwrap_or(DEFAULT_TARGET_TRIPLE)
    }

    /// Layer `over` on top of `self`; whatever `over` sets wins.
    pub fn merge(self, over: Config) -> Config {
        Config {
            target_triple: over.target_triple.or(self.target_triple),
        }
    }
}

/// Pull `#target <triple>` lines out of the source.
///
/// Directive lines are blanked rather than removed so token positions still
/// match the file.
pub fn process_directives(source: &str) -> (String, Config) {
    let mut config = Config::default();
    let mut lines: Vec<&str> = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#target") {
            if let Some(triple) = rest.split_whitespace().next() {
                config.target_triple = Some(triple.to_string());
            }
            lines.push("");
        } else {
            lines.push(line);
        }
    }
    (lines.join("\n"), config)
}
