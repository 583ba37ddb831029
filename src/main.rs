use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use statement_pdf::LayoutConfig;
use statement_pdf::config::AssetConfig;

#[derive(Parser, Debug)]
#[command(name = "statement-pdf", version, about = "Render a bank account statement to PDF")]
struct Cli {
    /// Statement workbook (.xlsx) or statement JSON (.json)
    input: PathBuf,

    /// Output PDF (defaults to the input name with a .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Layout configuration as JSON
    #[arg(long, value_name = "JSON")]
    layout: Option<PathBuf>,

    /// Maximum ledger rows per page
    #[arg(long, value_name = "N")]
    max_rows: Option<usize>,

    /// Extra directory to search for fonts (repeatable)
    #[arg(long, value_name = "DIR")]
    font_dir: Vec<PathBuf>,

    /// Directory holding logo.*, band.*, title.* and footer.* images
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn layout_config(cli: &Cli) -> Result<LayoutConfig, statement_pdf::Error> {
    let mut config = match &cli.layout {
        Some(path) => LayoutConfig::from_json_file(path)?,
        None => LayoutConfig::default(),
    };
    if let Some(max_rows) = cli.max_rows {
        config.max_rows_per_page = max_rows;
    }
    config.fonts.directories.extend(cli.font_dir.iter().cloned());
    if let Some(dir) = &cli.assets {
        config.assets = AssetConfig::from_dir(dir);
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<PathBuf, statement_pdf::Error> {
    let config = layout_config(cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));
    let is_json = cli
        .input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        statement_pdf::convert_json_to_pdf(&cli.input, &output, &config)?;
    } else {
        statement_pdf::convert_xlsx_to_pdf(&cli.input, &output, &config)?;
    }
    Ok(output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            log::info!("Wrote {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
