use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use gflabel_core::{FontOptions, FontSizing, FontStyle, LabelStyle, RenderOptions};
use gflabel_fragments::{FragmentRegistry, manifest};
use gflabel_layout::{LabelEngine, SheetSpec};
use gflabel_text::AdvanceMetrics;

use crate::bases::{BaseArea, BaseKind, BaseRequest, Length, base_area};
use crate::error::{CliError, Result};
use crate::listing::{write_fragments, write_symbols};
use crate::logging;
use crate::output::{Colors, OutputTarget, PlacementDocument};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "gflabel",
    about = "Lay out gridfinity label strings and write placement records",
    version
)]
pub struct Cli {
    /// Label strings, one per division.
    #[arg(required_unless_present_any = ["list_fragments", "list_symbols"])]
    pub labels: Vec<String>,

    /// Base shape: pred, predbox, tailor, plain, none, cullenect (webb) or modern.
    #[arg(long, default_value = "pred")]
    pub base: BaseKind,

    /// Label width, in gridfinity units (2u) or a length (30mm, 4cm, 1in).
    #[arg(short, long)]
    pub width: Option<Length>,

    /// Label height, as a length.
    #[arg(long)]
    pub height: Option<Length>,

    /// Extrusion depth of the label contents, in mm.
    #[arg(long, default_value_t = 0.4)]
    pub depth: f64,

    /// Labels per physical label; 0 puts every label on one.
    #[arg(short, long, default_value_t = 1)]
    pub divisions: usize,

    /// Keep items at full size next to overheight fragments.
    #[arg(long)]
    pub no_overheight: bool,

    #[arg(long, env = "GFLABEL_FONT", default_value = FontOptions::DEFAULT_FAMILY)]
    pub font: String,

    /// Font file to use instead of looking up the family.
    #[arg(long)]
    pub font_path: Option<PathBuf>,

    #[arg(long, default_value = "regular")]
    pub font_style: FontStyle,

    /// Exact font size in mm; skips fitting and may overflow.
    #[arg(long, conflicts_with = "font_size_maximum")]
    pub font_size: Option<f64>,

    /// Largest font size in mm the fit may choose.
    #[arg(long)]
    pub font_size_maximum: Option<f64>,

    /// Margin around the contents of each label, in mm.
    #[arg(long)]
    pub margin: Option<f64>,

    /// Output files; only .json is written here, `-` is stdout.
    #[arg(short, long = "output", default_value = "label.json")]
    pub outputs: Vec<PathBuf>,

    #[arg(long, default_value = "embossed")]
    pub style: LabelStyle,

    /// Vertical gap between stacked physical labels, in mm.
    #[arg(long, default_value_t = 2.0)]
    pub label_gap: f64,

    /// Gap between columns, in mm.
    #[arg(long, default_value_t = 0.4)]
    pub column_gap: f64,

    /// Cullenect revision: latest, v1.1, v2.0.0 or v2+.
    #[arg(long = "version-base")]
    pub version_base: Option<String>,

    /// Depth of a modern label body, in mm.
    #[arg(long)]
    pub label_depth: Option<f64>,

    #[arg(long)]
    pub base_color: Option<String>,

    #[arg(long)]
    pub label_color: Option<String>,

    /// Worker threads for large batches.
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,

    /// More diagnostics; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the fragment names and exit.
    #[arg(long)]
    pub list_fragments: bool,

    /// Print the electronic symbol library and exit.
    #[arg(long)]
    pub list_symbols: bool,
}

impl Cli {
    fn base_request(&self) -> BaseRequest {
        BaseRequest {
            kind: self.base,
            width: self.width,
            height: self.height,
            version: self.version_base.clone(),
            label_depth_mm: self.label_depth,
        }
    }

    fn font_sizing(&self) -> Result<FontSizing> {
        let sizing = match (self.font_size, self.font_size_maximum) {
            (Some(_), Some(_)) => {
                return Err(CliError::invalid(
                    "--font-size and --font-size-maximum cannot be combined",
                ));
            }
            (Some(mm), None) => FontSizing::Fixed(mm),
            (None, Some(mm)) => FontSizing::Maximum(mm),
            (None, None) => FontSizing::Auto,
        };
        match sizing.ceiling() {
            Some(mm) if !(mm.is_finite() && mm > 0.0) => Err(CliError::invalid(format!(
                "font size must be positive, got {mm}"
            ))),
            _ => Ok(sizing),
        }
    }

    /// Render options for a base, with command line values taking priority.
    pub fn render_options(&self, base: &BaseArea) -> Result<RenderOptions> {
        let defaults = RenderOptions::default();
        let margin_mm = self
            .margin
            .or(base.default_margin_mm)
            .unwrap_or(defaults.margin_mm);
        for (name, value) in [
            ("--margin", margin_mm),
            ("--depth", self.depth),
            ("--column-gap", self.column_gap),
            ("--label-gap", self.label_gap),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CliError::invalid(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if let Some(path) = self.font_path.as_ref().filter(|path| !path.is_file()) {
            return Err(CliError::invalid(format!(
                "font file {} does not exist",
                path.display()
            )));
        }

        Ok(RenderOptions {
            margin_mm,
            column_gap_mm: self.column_gap,
            font: FontOptions {
                family: self.font.clone(),
                style: self.font_style,
                path: self.font_path.clone(),
                sizing: self.font_sizing()?,
            },
            allow_overheight: !self.no_overheight,
            style: self.style,
            depth_mm: self.depth,
            ..defaults
        })
    }

    pub fn sheet(&self, base: &BaseArea) -> SheetSpec {
        SheetSpec {
            label_size: base.area,
            divisions: self.divisions,
            label_gap_mm: self.label_gap,
        }
    }

    /// Worker count, never more than there are labels.
    fn worker_threads(&self) -> usize {
        let available = self
            .threads
            .or_else(|| std::thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get);
        available.min(self.labels.len()).max(1)
    }

    fn colors(&self) -> Colors {
        Colors {
            base: self.base_color.clone(),
            label: self.label_color.clone(),
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose);

    if cli.list_fragments || cli.list_symbols {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if cli.list_fragments {
            write_fragments(&mut out, FragmentRegistry::builtin())?;
        }
        if cli.list_symbols {
            write_symbols(&mut out, manifest())?;
        }
        return Ok(());
    }

    let targets = cli
        .outputs
        .iter()
        .map(|path| OutputTarget::parse(path))
        .collect::<Result<Vec<_>>>()?;
    let document = render(&cli)?;
    for target in &targets {
        target.write(&document)?;
    }

    let failed = document.failures();
    if failed > 0 {
        return Err(CliError::LabelsFailed {
            failed,
            total: document.labels.len(),
        });
    }
    Ok(())
}

/// Lay out every label of `cli` without writing anything.
pub fn render(cli: &Cli) -> Result<PlacementDocument> {
    let base = base_area(&cli.base_request())?;
    let options = cli.render_options(&base)?;
    let sheet = cli.sheet(&base);
    tracing::debug!(
        base = %base.kind,
        labels = cli.labels.len(),
        divisions = sheet.divisions,
        "rendering"
    );

    let metrics = AdvanceMetrics::new();
    let engine = LabelEngine::new(FragmentRegistry::builtin(), &metrics, options.clone());
    let outcomes = match NonZeroUsize::new(cli.worker_threads()) {
        Some(threads) if threads.get() > 1 => {
            engine.render_sheet_parallel(&cli.labels, &sheet, threads)
        }
        _ => engine.render_sheet(&cli.labels, &sheet),
    };

    let warnings: usize = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .map(|label| label.warnings.len())
        .sum();
    if warnings > 0 {
        tracing::info!(warnings, "some labels overflow their area");
    }

    PlacementDocument::build(base, options, sheet, cli.colors(), outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["gflabel"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_render_options() {
        let cli = cli(&["M3"]);
        assert_eq!(cli.base, BaseKind::Pred);
        assert_eq!(cli.divisions, 1);
        assert_eq!(cli.outputs, vec![PathBuf::from("label.json")]);

        let base = base_area(&cli.base_request()).unwrap();
        let options = cli.render_options(&base).unwrap();
        assert_eq!(options.margin_mm, 0.4);
        assert_eq!(options.column_gap_mm, 0.4);
        assert!(options.allow_overheight);
        assert_eq!(options.font.sizing, FontSizing::Auto);
    }

    #[test]
    fn base_margin_applies_unless_overridden() {
        let boxed = cli(&["--base", "predbox", "--width", "5", "M3"]);
        let base = base_area(&boxed.base_request()).unwrap();
        assert_eq!(boxed.render_options(&base).unwrap().margin_mm, 3.0);

        let explicit = cli(&["--base", "predbox", "--width", "5", "--margin", "1", "M3"]);
        assert_eq!(explicit.render_options(&base).unwrap().margin_mm, 1.0);
    }

    #[test]
    fn font_size_options_conflict() {
        let result = Cli::try_parse_from([
            "gflabel",
            "--font-size",
            "4",
            "--font-size-maximum",
            "5",
            "M3",
        ]);
        assert!(result.is_err());

        let fixed = cli(&["--font-size", "4", "M3"]);
        assert_eq!(fixed.font_sizing().unwrap(), FontSizing::Fixed(4.0));
        let capped = cli(&["--font-size-maximum", "5", "M3"]);
        assert_eq!(capped.font_sizing().unwrap(), FontSizing::Maximum(5.0));
    }

    #[test]
    fn listing_needs_no_labels() {
        assert!(Cli::try_parse_from(["gflabel"]).is_err());
        let listing = cli(&["--list-symbols"]);
        assert!(listing.labels.is_empty());
    }

    #[test]
    fn style_and_overheight_flags() {
        let cli = cli(&["--style", "debossed", "--no-overheight", "--base", "none", "-w", "30", "M3"]);
        let base = base_area(&cli.base_request()).unwrap();
        let options = cli.render_options(&base).unwrap();
        assert_eq!(options.style, LabelStyle::Debossed);
        assert!(!options.allow_overheight);
    }

    #[test]
    fn negative_gaps_are_rejected() {
        let cli = cli(&["--column-gap=-1", "M3"]);
        let base = base_area(&cli.base_request()).unwrap();
        assert_eq!(cli.render_options(&base).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn render_keeps_failures_in_order() {
        let cli = cli(&["--divisions", "0", "M3", "{nosuchthing}", "M4"]);
        let document = render(&cli).unwrap();
        assert_eq!(document.labels.len(), 3);
        assert_eq!(document.failures(), 1);
        assert!(document.labels[1].is_error());
        assert!(!document.labels[2].is_error());
    }

    #[test]
    fn worker_threads_never_exceed_labels() {
        let cli = cli(&["--threads", "8", "A", "B"]);
        assert_eq!(cli.worker_threads(), 2);
    }
}
