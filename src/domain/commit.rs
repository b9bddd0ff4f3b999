use once_cell::sync::Lazy;
use regex::Regex;

static CONVENTIONAL_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z]+)(\([^()\r\n]+\))?!?: \S").expect("conventional header pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Build,
    Ci,
    Chore,
    Revert,
}

/// Keyword lookup used when a message has to be prefixed with a type.
/// Checked in order; the first hit wins.
const KEYWORD_TYPES: &[(&str, CommitType)] = &[
    ("revert", CommitType::Revert),
    ("fix", CommitType::Fix),
    ("fixes", CommitType::Fix),
    ("fixed", CommitType::Fix),
    ("bug", CommitType::Fix),
    ("bugfix", CommitType::Fix),
    ("hotfix", CommitType::Fix),
    ("resolve", CommitType::Fix),
    ("repair", CommitType::Fix),
    ("crash", CommitType::Fix),
    ("add", CommitType::Feat),
    ("adds", CommitType::Feat),
    ("added", CommitType::Feat),
    ("new", CommitType::Feat),
    ("feature", CommitType::Feat),
    ("implement", CommitType::Feat),
    ("introduce", CommitType::Feat),
    ("support", CommitType::Feat),
    ("doc", CommitType::Docs),
    ("docs", CommitType::Docs),
    ("readme", CommitType::Docs),
    ("documentation", CommitType::Docs),
    ("test", CommitType::Test),
    ("tests", CommitType::Test),
    ("refactor", CommitType::Refactor),
    ("restructure", CommitType::Refactor),
    ("rename", CommitType::Refactor),
    ("cleanup", CommitType::Refactor),
    ("simplify", CommitType::Refactor),
    ("perf", CommitType::Perf),
    ("performance", CommitType::Perf),
    ("optimize", CommitType::Perf),
    ("optimise", CommitType::Perf),
    ("speed", CommitType::Perf),
    ("style", CommitType::Style),
    ("format", CommitType::Style),
    ("lint", CommitType::Style),
    ("whitespace", CommitType::Style),
    ("build", CommitType::Build),
    ("deps", CommitType::Build),
    ("dependency", CommitType::Build),
    ("dependencies", CommitType::Build),
    ("bump", CommitType::Build),
    ("upgrade", CommitType::Build),
    ("ci", CommitType::Ci),
    ("pipeline", CommitType::Ci),
];

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Perf => "perf",
            CommitType::Test => "test",
            CommitType::Build => "build",
            CommitType::Ci => "ci",
            CommitType::Chore => "chore",
            CommitType::Revert => "revert",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "feat" => Some(CommitType::Feat),
            "fix" => Some(CommitType::Fix),
            "docs" => Some(CommitType::Docs),
            "style" => Some(CommitType::Style),
            "refactor" => Some(CommitType::Refactor),
            "perf" => Some(CommitType::Perf),
            "test" => Some(CommitType::Test),
            "build" => Some(CommitType::Build),
            "ci" => Some(CommitType::Ci),
            "chore" => Some(CommitType::Chore),
            "revert" => Some(CommitType::Revert),
            _ => None,
        }
    }

    /// Infers a type from the words of a message, defaulting to `chore`.
    pub fn infer(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        KEYWORD_TYPES
            .iter()
            .find(|(keyword, _)| words.iter().any(|word| word == keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(CommitType::Chore)
    }

    pub fn all() -> &'static [CommitType] {
        &[
            CommitType::Feat,
            CommitType::Fix,
            CommitType::Docs,
            CommitType::Style,
            CommitType::Refactor,
            CommitType::Perf,
            CommitType::Test,
            CommitType::Build,
            CommitType::Ci,
            CommitType::Chore,
            CommitType::Revert,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStyle {
    pub conventional: bool,
    pub language: String,
}

impl Default for CommitStyle {
    fn default() -> Self {
        Self {
            conventional: true,
            language: "English".to_string(),
        }
    }
}

/// True when the first line is `type(scope)?: subject` with a known type.
pub fn is_conventional(message: &str) -> bool {
    let header = message.lines().next().unwrap_or_default();
    CONVENTIONAL_HEADER
        .captures(header)
        .and_then(|caps| caps.get(1))
        .is_some_and(|kind| CommitType::from_str(kind.as_str()).is_some())
}

/// Strips wrapping the model tends to add: code fences and quotes.
pub fn clean_message(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // drop the optional language tag on the opening fence
        text = rest.split_once('\n').map_or(rest, |(_, body)| body);
        text = text.trim_end().strip_suffix("```").unwrap_or(text).trim();
    }

    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim();
        }
    }

    text.to_string()
}

pub fn format_commit_message(message: &str, style: &CommitStyle) -> String {
    let cleaned = clean_message(message);
    if !style.conventional || cleaned.is_empty() || is_conventional(&cleaned) {
        return cleaned;
    }
    let kind = CommitType::infer(&cleaned);
    format!("{}: {}", kind.as_str(), cleaned)
}
