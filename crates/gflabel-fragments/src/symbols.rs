#![forbid(unsafe_code)]

//! Electronic symbol library and selector matching.

use std::fmt;
use std::sync::OnceLock;

use gflabel_core::{Candidate, LabelError, Span};
use serde::{Deserialize, Serialize};

const MANIFEST_JSON: &str = include_str!("resources/symbols.json");

/// One entry of the symbol manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub standard: String,
    pub filename: String,
    /// Width over height of the drawing.
    pub aspect: f64,
}

impl SymbolEntry {
    fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id.clone(),
            category: Some(self.category.clone()),
            standard: Some(self.standard.clone()),
        }
    }

    /// Lowercased name with a trailing standard qualifier removed.
    fn bare_name(&self) -> String {
        let lowered = self.name.to_lowercase();
        for suffix in [" (iec)", " (ieee/ansi)", " (common style)"] {
            if let Some(stripped) = lowered.strip_suffix(suffix) {
                return stripped.to_string();
            }
        }
        lowered
    }

    fn exact_keys(&self) -> [String; 4] {
        [
            self.id.to_lowercase(),
            self.name.to_lowercase(),
            self.filename.to_lowercase(),
            self.bare_name(),
        ]
    }

    /// Search tokens for fuzzy matching.
    fn soup(&self) -> Vec<String> {
        let mut soup: Vec<String> = [&self.category, &self.name, &self.id]
            .iter()
            .flat_map(|field| {
                field
                    .to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        if soup.iter().any(|token| token == "logic") {
            soup.push("gate".to_string());
        }
        soup
    }
}

/// Drawing conventions a symbol can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Common,
    Iec,
    Ieee,
}

impl Standard {
    /// Preference order when nothing is requested.
    pub const ORDER: [Standard; 3] = [Standard::Common, Standard::Iec, Standard::Ieee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Iec => "iec",
            Self::Ieee => "ieee",
        }
    }

    /// Recognise a selector naming a standard, aliases included.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "common" | "com" => Some(Self::Common),
            "iec" | "euro" | "europe" => Some(Self::Iec),
            "ieee" | "ansi" => Some(Self::Ieee),
            _ => None,
        }
    }

    fn matches(&self, manifest_standard: &str) -> bool {
        manifest_standard.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The built-in manifest, parsed on first use.
pub fn manifest() -> &'static [SymbolEntry] {
    static MANIFEST: OnceLock<Vec<SymbolEntry>> = OnceLock::new();
    MANIFEST.get_or_init(|| {
        serde_json::from_str(MANIFEST_JSON).unwrap_or_else(|error| {
            tracing::error!(%error, "embedded symbol manifest is malformed");
            Vec::new()
        })
    })
}

/// Resolves `symbol(...)` selectors against a manifest.
#[derive(Debug, Clone, Copy)]
pub struct SymbolMatcher<'a> {
    entries: &'a [SymbolEntry],
}

impl SymbolMatcher<'static> {
    pub fn builtin() -> Self {
        Self::new(manifest())
    }
}

impl<'a> SymbolMatcher<'a> {
    pub fn new(entries: &'a [SymbolEntry]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'a [SymbolEntry] {
        self.entries
    }

    /// Pick the symbol a list of selectors describes.
    ///
    /// Exact matches on id, name or filename win. Otherwise every request
    /// token must be a substring of some token of the symbol's category,
    /// name or id. Several matches in one category are narrowed by standard
    /// preference; anything still ambiguous is an error listing the
    /// candidates.
    pub fn resolve<S: AsRef<str>>(&self, selectors: &[S]) -> Result<&'a SymbolEntry, LabelError> {
        let mut requested: Vec<String> = Vec::new();
        for selector in selectors {
            let lowered = selector.as_ref().trim().to_lowercase();
            let stripped = [".svg", ".png", ".jpg"]
                .iter()
                .find_map(|ext| lowered.strip_suffix(ext))
                .unwrap_or(lowered.as_str())
                .to_string();
            if !stripped.is_empty() && !requested.contains(&stripped) {
                requested.push(stripped);
            }
        }

        let mut standard = None;
        requested.retain(|selector| match Standard::from_selector(selector) {
            Some(found) => {
                if standard.is_none() {
                    standard = Some(Ok(found));
                } else if standard != Some(Ok(found)) {
                    standard = Some(Err(()));
                }
                false
            }
            None => true,
        });
        let standard = match standard {
            Some(Err(())) => {
                return Err(LabelError::arguments(
                    "symbol",
                    "more than one symbol standard selected",
                ));
            }
            Some(Ok(found)) => Some(found),
            None => None,
        };
        let order = preference_order(standard);
        let description = requested.join(",");

        let mut matches: Vec<&'a SymbolEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                let keys = entry.exact_keys();
                requested.iter().any(|selector| keys.contains(selector))
            })
            .collect();

        if matches.is_empty() {
            let tokens: Vec<&str> = requested
                .iter()
                .flat_map(|selector| selector.split_whitespace())
                .collect();
            tracing::debug!(?tokens, "no exact symbol match, trying fuzzy match");
            matches = self
                .entries
                .iter()
                .filter(|entry| {
                    let soup = entry.soup();
                    tokens
                        .iter()
                        .all(|token| soup.iter().any(|item| item.contains(token)))
                })
                .collect();
        }

        if matches.is_empty() {
            return Err(LabelError::arguments(
                "symbol",
                format!("no symbol matches '{description}'"),
            ));
        }

        if matches.len() > 1 {
            let first_category = &matches[0].category;
            if matches.iter().all(|entry| &entry.category == first_category) {
                let preferred = order
                    .iter()
                    .find(|standard| matches.iter().any(|entry| standard.matches(&entry.standard)));
                if let Some(preferred) = preferred {
                    matches.retain(|entry| preferred.matches(&entry.standard));
                }
            }
        }

        match matches.as_slice() {
            [single] => {
                tracing::debug!(id = %single.id, standard = %single.standard, "resolved symbol");
                Ok(*single)
            }
            several => {
                let mut candidates: Vec<Candidate> =
                    several.iter().map(|entry| entry.candidate()).collect();
                candidates.sort();
                Err(LabelError::AmbiguousFragment {
                    name: format!("symbol({description})"),
                    span: Span::default(),
                    candidates,
                })
            }
        }
    }
}

fn preference_order(requested: Option<Standard>) -> Vec<Standard> {
    let mut order = Standard::ORDER.to_vec();
    if let Some(requested) = requested {
        order.retain(|standard| *standard != requested);
        order.insert(0, requested);
    }
    order
}
