use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tcvn3_unicode::classify::{is_already_unicode, is_likely_non_text};
use tcvn3_unicode::config::{init_default_config, ToolConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use tcvn3_unicode::convert::{
    write_report, ConversionOrchestrator, CsvGrid, SkipSelection, DEFAULT_HIGHLIGHT_COLOR,
};
use tcvn3_unicode::mapping::{load_tables, CharacterMapping, ColumnIdentifier, MapBuilder};
use tcvn3_unicode::progress::ConsoleProgress;
use tcvn3_unicode::textutil::clip;
use tcvn3_unicode::Transducer;

const PREVIEW_CLIP_CHARS: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "tcvn3-unicode")]
#[command(about = "Convert legacy TCVN3 (.VnTime) Vietnamese text in CSV sheets to Unicode", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Build the mapping from reference tables (CSV, or JSON `[{"headers", "rows"}]`), then exit
    #[arg(long, value_name = "TABLE", num_args = 1..)]
    build_map: Vec<PathBuf>,

    /// Where --build-map writes the mapping (default: [mapping].path; a CSV copy is written too)
    #[arg(long, value_name = "PATH")]
    map_out: Option<PathBuf>,

    /// Convert a sample string and print the result
    #[arg(long, value_name = "TEXT")]
    test: Option<String>,

    /// Report whether a string already reads as Unicode
    #[arg(long, value_name = "TEXT")]
    classify: Option<String>,

    /// List text cells with their converted form instead of writing output
    #[arg(long)]
    preview: bool,

    /// With --preview, write a skip selection marking every Unicode-looking cell as skipped;
    /// edit entries to false and pass the file back with --skip-selection
    #[arg(long, value_name = "JSON", requires = "preview")]
    review_out: Option<PathBuf>,

    /// Input CSV file, or a directory of CSV files (one sheet each)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file or directory (default: <input>_unicode)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Mapping file, JSON or CSV (default: [mapping].path, then [mapping].csv_path)
    #[arg(long, value_name = "PATH")]
    map: Option<PathBuf>,

    /// JSON object of per-cell overrides: {"Sheet_1_0": false} forces conversion of a cell
    #[arg(long, value_name = "JSON")]
    skip_selection: Option<PathBuf>,

    /// Convert cells even when they already read as Unicode
    #[arg(long)]
    no_skip_unicode: bool,

    /// Highlight converted cells (grids that support formatting only)
    #[arg(long, value_name = "COLOR", num_args = 0..=1, default_missing_value = DEFAULT_HIGHLIGHT_COLOR)]
    highlight: Option<String>,

    /// Conversion report path (default: <output>_conversion_log.txt)
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Config file path (default: search for tcvn3-unicode.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let workdir = match args.input.as_deref() {
        Some(p) if p.is_dir() => p.to_path_buf(),
        Some(p) => p
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => PathBuf::from("."),
    };
    let workdir = workdir.canonicalize().unwrap_or(workdir);
    let cfg = ToolConfig::resolve(args.config.clone(), &workdir)?;

    if !args.build_map.is_empty() {
        return build_map(&args, &cfg, &progress);
    }

    if let Some(text) = args.classify.as_deref() {
        let verdict = if is_already_unicode(text) {
            "unicode"
        } else {
            "legacy"
        };
        println!("{verdict}");
        if is_likely_non_text(text) {
            println!("(no text content)");
        }
        return Ok(());
    }

    if let Some(text) = args.test.as_deref() {
        let transducer = Transducer::compile(&load_mapping(&args, &cfg)?);
        println!("{}", transducer.apply(text));
        return Ok(());
    }

    let input = match args.input.clone() {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  tcvn3-unicode --build-map table1.csv table2.csv\n  tcvn3-unicode <input.csv | dir>\n\nTIPS:\n  - Default config search: {CONFIG_FILE_NAME} (upwards), or set {CONFIG_ENV_VAR}.\n"
            );
            return Ok(());
        }
    };
    convert(&args, &cfg, &progress, &input)
}

fn load_mapping(args: &Args, cfg: &ToolConfig) -> anyhow::Result<CharacterMapping> {
    let mapping = match args.map.as_deref() {
        Some(p) => CharacterMapping::load(p)?,
        None => CharacterMapping::load_first(&cfg.map_candidates())?,
    };
    tracing::info!(
        entries = mapping.len(),
        fingerprint = %mapping.fingerprint(),
        "mapping loaded"
    );
    Ok(mapping)
}

fn build_map(args: &Args, cfg: &ToolConfig, progress: &ConsoleProgress) -> anyhow::Result<()> {
    progress.info(format!("reading {} reference tables", args.build_map.len()));
    let tables = load_tables(args.build_map.as_slice(), cfg.has_header)
        .context("load reference tables")?;
    let builder = MapBuilder::new(ColumnIdentifier::new(cfg.min_column_score));
    let built = builder.build(&tables).context("build mapping")?;

    let used = built.tables.iter().filter(|t| t.roles.is_some()).count();
    progress.info(format!(
        "{} entries from {used}/{} tables",
        built.mapping.len(),
        built.tables.len()
    ));

    let (json_path, csv_path) = match args.map_out.as_ref() {
        Some(p) => (p.clone(), p.with_extension("csv")),
        None => (cfg.map_path.clone(), cfg.map_csv_path.clone()),
    };
    for path in [&json_path, &csv_path] {
        built
            .mapping
            .save(path)
            .with_context(|| format!("write mapping: {}", path.display()))?;
        progress.info(format!("wrote {}", path.display()));
    }
    Ok(())
}

fn convert(
    args: &Args,
    cfg: &ToolConfig,
    progress: &ConsoleProgress,
    input: &Path,
) -> anyhow::Result<()> {
    let mapping = load_mapping(args, cfg)?;
    let transducer = Transducer::compile(&mapping);
    let orchestrator = ConversionOrchestrator::new(&transducer);
    let mut grid =
        CsvGrid::open(input).with_context(|| format!("open input: {}", input.display()))?;

    if args.preview {
        let samples = orchestrator.preview(&grid, usize::MAX)?;
        for entry in &samples {
            let marker = if entry.was_unicode { " " } else { "*" };
            println!(
                "{marker} {}  {}  =>  {}",
                entry.cell_id(),
                clip(&entry.original, PREVIEW_CLIP_CHARS),
                clip(&entry.converted, PREVIEW_CLIP_CHARS)
            );
        }
        if let Some(path) = args.review_out.as_deref() {
            let review = SkipSelection::from_preview(&samples);
            let json = review.to_json_pretty().context("serialize skip selection")?;
            std::fs::write(path, json)
                .with_context(|| format!("write skip selection: {}", path.display()))?;
            progress.info(format!(
                "{} unicode-looking cells listed in {}",
                review.len(),
                path.display()
            ));
        }
        return Ok(());
    }

    let skip = match args.skip_selection.as_deref() {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("read skip selection: {}", p.display()))?;
            SkipSelection::from_json(&text).context("parse skip selection json")?
        }
        None => SkipSelection::new(),
    };

    let mut options = cfg.conversion_options();
    if args.no_skip_unicode {
        options.skip_already_unicode = false;
    }
    if let Some(color) = args.highlight.as_ref() {
        options.highlight = Some(color.clone());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| CsvGrid::default_output(input, &cfg.output_suffix));
    let mut on_sheet = progress.sheet_callback();
    let stats = orchestrator
        .run(&mut grid, &options, &skip, Some(&mut on_sheet))
        .context("convert")?;
    grid.save(&output)
        .with_context(|| format!("write output: {}", output.display()))?;
    progress.info(format!("wrote {}", output.display()));
    progress.summary(&stats);

    let report = args.report.clone().or_else(|| {
        cfg.write_report
            .then(|| report_path_for(&output, &cfg.report_suffix))
    });
    if let Some(path) = report {
        write_report(&path, &stats, Some(&mapping.fingerprint()))
            .with_context(|| format!("write report: {}", path.display()))?;
        progress.info(format!("report: {}", path.display()));
    }
    Ok(())
}

/// `out.csv` → `out_conversion_log.txt`; a directory gets the report next to it.
fn report_path_for(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}{suffix}"))
}
