#![forbid(unsafe_code)]

//! The fragment registry.
//!
//! Fragment kinds form a closed enumeration. The registry maps every name
//! and alias to a [`FragmentDescriptor`] once at construction and is only
//! read afterwards, so one instance can be shared by reference across
//! threads rendering different labels.
//!
//! Name resolution is a pure function over the table:
//! 1. exact match on a registered name,
//! 2. case-insensitive exact match,
//! 3. case-insensitive prefix match, which must identify a single kind.
//!
//! Punctuation names (`...`, `|`, `<`, `>`) only match exactly.

use std::fmt;
use std::sync::OnceLock;

use bitflags::bitflags;
use gflabel_core::{Candidate, LabelError, Span};
use rustc_hash::FxHashMap;
use serde::Serialize;

bitflags! {
    /// What a fragment kind can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Has a size derived from the line size alone.
        const INTRINSIC_SIZE = 0b0_0001;
        /// May be taller than an ordinary text line.
        const OVERHEIGHT     = 0b0_0010;
        /// Accepts a `:scale(..):offset(..)` modifier chain.
        const MODIFIERS      = 0b0_0100;
        /// Takes its width from the space left on the line.
        const VARIABLE_WIDTH = 0b0_1000;
        /// Shapes the label layout and is never placed.
        const STRUCTURAL     = 0b1_0000;
    }
}

/// Every fragment kind the language knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Expand,
    #[serde(rename = "hexhead")]
    HexHead,
    Head,
    ThreadedInsert,
    #[serde(rename = "hexnut")]
    HexNut,
    Washer,
    #[serde(rename = "lockwasher")]
    LockWasher,
    Circle,
    Magnet,
    Bolt,
    #[serde(rename = "webbolt")]
    WebBolt,
    VariableResistor,
    Box,
    Symbol,
    Measure,
    Splitter,
    Align,
}

impl FragmentKind {
    /// Canonical registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Expand => "...",
            Self::HexHead => "hexhead",
            Self::Head => "head",
            Self::ThreadedInsert => "threaded_insert",
            Self::HexNut => "hexnut",
            Self::Washer => "washer",
            Self::LockWasher => "lockwasher",
            Self::Circle => "circle",
            Self::Magnet => "magnet",
            Self::Bolt => "bolt",
            Self::WebBolt => "webbolt",
            Self::VariableResistor => "variable_resistor",
            Self::Box => "box",
            Self::Symbol => "symbol",
            Self::Measure => "measure",
            Self::Splitter => "|",
            Self::Align => "<",
        }
    }

    /// Whether placements of this kind produce visible geometry.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Expand | Self::Splitter | Self::Align)
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability record for one fragment kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDescriptor {
    pub kind: FragmentKind,
    /// Canonical name first, then aliases.
    pub names: &'static [&'static str],
    pub description: &'static str,
    pub examples: &'static [&'static str],
    pub capabilities: Capabilities,
    /// Height multiple of the line size, for overheight kinds.
    pub overheight: Option<f64>,
    /// Allocation order among variable-width kinds; higher goes first.
    pub priority: u8,
}

impl FragmentDescriptor {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[inline]
    pub fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn is_variable_width(&self) -> bool {
        self.has(Capabilities::VARIABLE_WIDTH)
    }

    pub fn accepts_modifiers(&self) -> bool {
        self.has(Capabilities::MODIFIERS)
    }
}

const PLACED: Capabilities = Capabilities::INTRINSIC_SIZE.union(Capabilities::MODIFIERS);
const TALL: Capabilities = PLACED.union(Capabilities::OVERHEIGHT);
const STRETCHY: Capabilities = Capabilities::VARIABLE_WIDTH.union(Capabilities::MODIFIERS);

fn builtin_descriptors() -> Vec<FragmentDescriptor> {
    let simple = |kind, names, description, examples| FragmentDescriptor {
        kind,
        names,
        description,
        examples,
        capabilities: PLACED,
        overheight: None,
        priority: 0,
    };

    vec![
        FragmentDescriptor {
            kind: FragmentKind::Expand,
            names: &["..."],
            description: "Blank area that always expands to fill available space. \
                          Several on one line share the space evenly; use them to \
                          justify or align text.",
            examples: &["L{...}R"],
            capabilities: Capabilities::VARIABLE_WIDTH,
            overheight: None,
            priority: 0,
        },
        simple(
            FragmentKind::HexHead,
            &["hexhead"],
            "Hexagonal screw head. Accepts drives, but they are optional.",
            &["{hexhead}", "{hexhead(hex)}"],
        ),
        simple(
            FragmentKind::Head,
            &["head"],
            "Round screw head showing one or more drives.",
            &["{head(phillips)}", "{head(torx, security)}"],
        ),
        simple(
            FragmentKind::ThreadedInsert,
            &["threaded_insert"],
            "Representation of a threaded insert.",
            &["{threaded_insert}"],
        ),
        simple(
            FragmentKind::HexNut,
            &["hexnut", "nut"],
            "Hexagonal nut with a circular cutout.",
            &["{nut}"],
        ),
        simple(
            FragmentKind::Washer,
            &["washer"],
            "Circular washer with a circular hole.",
            &["{washer}"],
        ),
        simple(
            FragmentKind::LockWasher,
            &["lockwasher"],
            "Circular washer with a locking cutout.",
            &["{lockwasher}"],
        ),
        simple(
            FragmentKind::Circle,
            &["circle"],
            "A filled circle.",
            &["{circle}"],
        ),
        simple(
            FragmentKind::Magnet,
            &["magnet"],
            "Horseshoe shaped magnet symbol.",
            &["{magnet}"],
        ),
        FragmentDescriptor {
            kind: FragmentKind::Bolt,
            names: &["bolt"],
            description: "Variable length bolt in side profile. If the requested \
                          length does not fit, the bolt is drawn as large as \
                          possible with a broken thread.",
            examples: &["{bolt(20)}", "{bolt(12, countersunk, tapping)}"],
            capabilities: STRETCHY,
            overheight: None,
            priority: 1,
        },
        FragmentDescriptor {
            kind: FragmentKind::WebBolt,
            names: &["webbolt"],
            description: "Fixed-length bolt showing its drive, drawn taller than \
                          the text around it.",
            examples: &["{webbolt(pozi)}"],
            capabilities: TALL,
            overheight: Some(1.6),
            priority: 0,
        },
        FragmentDescriptor {
            kind: FragmentKind::VariableResistor,
            names: &["variable_resistor"],
            description: "Electrical symbol of a variable resistor.",
            examples: &["{variable_resistor}"],
            capabilities: TALL,
            overheight: Some(1.5),
            priority: 0,
        },
        simple(
            FragmentKind::Box,
            &["box"],
            "Box of a given width in mm, centred on the line. Without a height \
             it fills the line height.",
            &["{box(35)}", "{box(10, 2)}"],
        ),
        simple(
            FragmentKind::Symbol,
            &["symbol", "sym"],
            "Electronic symbol from the built-in library, chosen by name, id or \
             fuzzy description plus an optional standard (common, iec, ieee).",
            &["{symbol(resistor)}", "{sym(and, gate, ieee)}"],
        ),
        FragmentDescriptor {
            kind: FragmentKind::Measure,
            names: &["measure"],
            description: "Fills as much area as possible with a dimension line and \
                          shows its length.",
            examples: &["{measure}A{measure}", "{bolt(10)}{measure}"],
            capabilities: STRETCHY,
            overheight: None,
            priority: 1,
        },
        FragmentDescriptor {
            kind: FragmentKind::Splitter,
            names: &["|"],
            description: "Column edge. Optional numbers on either side set the \
                          relative column proportions.",
            examples: &["A{|}B", "{2|1}wide{|}narrow"],
            capabilities: Capabilities::STRUCTURAL,
            overheight: None,
            priority: 0,
        },
        FragmentDescriptor {
            kind: FragmentKind::Align,
            names: &["<", ">"],
            description: "Only valid at the start of a label or column. Packs \
                          every line of that column against the left or right \
                          edge.",
            examples: &["{<}Left\nLines", "{>}Right"],
            capabilities: Capabilities::STRUCTURAL,
            overheight: None,
            priority: 0,
        },
    ]
}

/// One row of the listing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionRow {
    pub names: Vec<String>,
    pub description: String,
    pub examples: Vec<String>,
}

/// Immutable name table over the fragment kinds.
#[derive(Debug)]
pub struct FragmentRegistry {
    descriptors: Vec<FragmentDescriptor>,
    by_name: FxHashMap<&'static str, usize>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        let descriptors = builtin_descriptors();
        let mut by_name = FxHashMap::default();
        for (index, descriptor) in descriptors.iter().enumerate() {
            for name in descriptor.names {
                by_name.insert(*name, index);
            }
        }
        tracing::debug!(
            kinds = descriptors.len(),
            names = by_name.len(),
            "fragment registry built"
        );
        Self {
            descriptors,
            by_name,
        }
    }

    /// Process-wide registry.
    pub fn builtin() -> &'static FragmentRegistry {
        static REGISTRY: OnceLock<FragmentRegistry> = OnceLock::new();
        REGISTRY.get_or_init(FragmentRegistry::new)
    }

    pub fn descriptors(&self) -> &[FragmentDescriptor] {
        &self.descriptors
    }

    /// Descriptor of a kind. The table holds one entry per kind, in
    /// declaration order.
    pub fn descriptor(&self, kind: FragmentKind) -> &FragmentDescriptor {
        &self.descriptors[kind as usize]
    }

    /// Resolve a fragment name.
    ///
    /// Errors carry a default span; callers attach the source location.
    pub fn lookup(&self, name: &str) -> Result<&FragmentDescriptor, LabelError> {
        if let Some(&index) = self.by_name.get(name) {
            return Ok(&self.descriptors[index]);
        }

        let lowered = name.to_lowercase();
        if let Some(&index) = self.by_name.get(lowered.as_str()) {
            return Ok(&self.descriptors[index]);
        }

        let unknown = || LabelError::UnknownFragment {
            name: name.to_string(),
            span: Span::default(),
        };
        if lowered.is_empty() || !lowered.starts_with(|c: char| c.is_alphanumeric()) {
            return Err(unknown());
        }

        let mut matched: Vec<usize> = self
            .by_name
            .iter()
            .filter(|(registered, _)| registered.starts_with(lowered.as_str()))
            .map(|(_, index)| *index)
            .collect();
        matched.sort_unstable();
        matched.dedup();

        match matched.as_slice() {
            [] => Err(unknown()),
            [index] => {
                tracing::trace!(
                    requested = name,
                    resolved = self.descriptors[*index].name(),
                    "prefix match"
                );
                Ok(&self.descriptors[*index])
            }
            several => {
                let mut candidates: Vec<Candidate> = several
                    .iter()
                    .map(|index| Candidate::named(self.descriptors[*index].name()))
                    .collect();
                candidates.sort();
                Err(LabelError::AmbiguousFragment {
                    name: name.to_string(),
                    span: Span::default(),
                    candidates,
                })
            }
        }
    }

    /// Listing table, sorted by first name, including the numeric gap entry.
    pub fn describe(&self) -> Vec<DescriptionRow> {
        let mut rows: Vec<DescriptionRow> = self
            .descriptors
            .iter()
            .map(|descriptor| {
                let mut names: Vec<String> =
                    descriptor.names.iter().map(ToString::to_string).collect();
                names.sort();
                DescriptionRow {
                    names,
                    description: descriptor.description.to_string(),
                    examples: descriptor.examples.iter().map(ToString::to_string).collect(),
                }
            })
            .collect();
        rows.push(DescriptionRow {
            names: vec!["1".to_string(), "4.2".to_string()],
            description: "A gap of specific width, in mm.".to_string(),
            examples: vec!["]{12.5}[".to_string()],
        });
        rows.sort_by(|a, b| a.names.first().cmp(&b.names.first()));
        rows
    }
}

impl Default for FragmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> &'static FragmentRegistry {
        FragmentRegistry::builtin()
    }

    #[test]
    fn exact_names_and_aliases_resolve() {
        assert_eq!(registry().lookup("nut").unwrap().kind, FragmentKind::HexNut);
        assert_eq!(registry().lookup("sym").unwrap().kind, FragmentKind::Symbol);
        assert_eq!(registry().lookup("...").unwrap().kind, FragmentKind::Expand);
        assert_eq!(registry().lookup(">").unwrap().kind, FragmentKind::Align);
    }

    #[test]
    fn exact_match_beats_prefix() {
        // "sym" is both a registered alias and a prefix of "symbol".
        assert_eq!(registry().lookup("sym").unwrap().name(), "symbol");
        assert_eq!(registry().lookup("bolt").unwrap().kind, FragmentKind::Bolt);
    }

    #[test]
    fn case_insensitive_and_prefix_matches() {
        assert_eq!(registry().lookup("WASHER").unwrap().kind, FragmentKind::Washer);
        assert_eq!(registry().lookup("thread").unwrap().kind, FragmentKind::ThreadedInsert);
        assert_eq!(registry().lookup("Mag").unwrap().kind, FragmentKind::Magnet);
    }

    #[test]
    fn ambiguous_prefix_lists_sorted_candidates() {
        let err = registry().lookup("hex").unwrap_err();
        let LabelError::AmbiguousFragment { candidates, .. } = err else {
            panic!("expected ambiguity, got {err:?}");
        };
        let ids: Vec<_> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["hexhead", "hexnut"]);
    }

    #[test]
    fn aliases_of_one_kind_are_not_ambiguous() {
        // "sy" prefixes both "symbol" and "sym".
        assert_eq!(registry().lookup("sy").unwrap().kind, FragmentKind::Symbol);
    }

    #[test]
    fn unknown_names_fail() {
        assert!(matches!(
            registry().lookup("sprocket"),
            Err(LabelError::UnknownFragment { .. })
        ));
        assert!(matches!(
            registry().lookup("."),
            Err(LabelError::UnknownFragment { .. })
        ));
    }

    #[test]
    fn capabilities_follow_kind() {
        let webbolt = registry().descriptor(FragmentKind::WebBolt);
        assert!(webbolt.has(Capabilities::OVERHEIGHT));
        assert_eq!(webbolt.overheight, Some(1.6));

        let bolt = registry().descriptor(FragmentKind::Bolt);
        assert!(bolt.is_variable_width());
        assert!(bolt.priority > registry().descriptor(FragmentKind::Expand).priority);
        assert!(!registry().descriptor(FragmentKind::Expand).accepts_modifiers());
    }

    #[test]
    fn table_is_indexed_by_kind() {
        for descriptor in registry().descriptors() {
            assert_eq!(registry().descriptor(descriptor.kind).kind, descriptor.kind);
        }
    }

    #[test]
    fn description_table_includes_gap_row() {
        let rows = registry().describe();
        assert!(rows.iter().any(|row| row.names.contains(&"4.2".to_string())));
        assert_eq!(rows.len(), registry().descriptors().len() + 1);
    }
}
