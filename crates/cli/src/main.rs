use std::{fs, path::PathBuf};

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use common::{
    command::Command,
    config::Settings,
    dispatch::{Confirm, dispatch_scan_command, dispatch_scanner_command, trigger_batch_download},
    export::export_rows_to_csv,
    filter::{
        GLOBAL_FILTER, GLOBAL_REGEX, InputState, apply_column_filter, apply_date_filter,
        apply_global_filter, column_filter_id, column_regex_id, date_end_id, date_start_id,
    },
    grid::{Context, DateField, Record, SortDir, Table},
    logging,
    models::Pk,
    network::NetworkClient,
    render::RenderTarget,
};
use dialoguer::{Confirm as Prompt, console::Term};
use tabled::{
    builder::Builder,
    settings::{Alignment, Color, Style, object::Rows},
};
use tracing::{error, warn};

fn print_table<'a, R: Record>(rows: impl IntoIterator<Item = &'a R>) {
    let mut builder = Builder::default();
    builder.push_record(R::columns().iter().map(|c| c.title.to_string()));
    let mut count = 0;
    for row in rows {
        builder.push_record(R::columns().iter().map(|c| (c.render)(row, RenderTarget::Plain)));
        count += 1;
    }
    if count == 0 {
        println!("No entries");
    } else {
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Alignment::center());
        table.modify(Rows::first(), Color::FG_CYAN);
        println!("{}", table);
    }
}

/// Page footer in the grid's wording.
fn print_summary<R: Record>(table: &Table<R>) {
    let shown = table.visible_len();
    let start = (table.page() * table.page_len() + 1).min(shown);
    let end = ((table.page() + 1) * table.page_len()).min(shown);
    let mut line = format!("Showing {start} to {end} of {shown} entries");
    if shown != table.rows().len() {
        line.push_str(&format!(" (filtered from {} total entries)", table.rows().len()));
    }
    println!("{line}");
}

/// Administer scans and scanners on a scan-management server
#[derive(Debug, Parser)]
#[command(name = "scanctl")]
#[command(version = "0.1.0")]
#[command(about = "Batch-control scans and scanners", long_about = None)]
struct Cli {
    /// Config file (SetServer, PageLength, CsrfToken statements)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Server base url, overriding the config
    #[arg(long, global = true)]
    server: Option<url::Url>,
    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List scans, optionally only those under one scanner
    ListScans {
        #[arg(long)]
        scanner: Option<Pk>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List scanners
    ListScanners {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Issue a batch command (CR, ST, PS, RS, SP, RT, DL or its name) to scans
    Scan {
        command: String,
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Issue a batch command (DL) to scanners
    Scanner {
        command: String,
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Download the results of the selected scans as one archive
    Download {
        #[command(flatten)]
        select: SelectArgs,
        /// Where to save the archive; defaults to the server's file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// Search across all columns
    #[arg(short, long)]
    search: Option<String>,
    /// Treat --search as a regular expression
    #[arg(long)]
    regex: bool,
    /// Search one column, as INDEX:TEXT
    #[arg(long = "col", value_parser = parse_column_filter)]
    columns: Vec<(usize, String)>,
    /// Treat the --col search for INDEX as a regular expression
    #[arg(long = "col-regex")]
    column_regex: Vec<usize>,
    #[arg(long)]
    created_from: Option<NaiveDate>,
    #[arg(long)]
    created_to: Option<NaiveDate>,
    #[arg(long)]
    started_from: Option<NaiveDate>,
    #[arg(long)]
    started_to: Option<NaiveDate>,
    #[arg(long)]
    ended_from: Option<NaiveDate>,
    #[arg(long)]
    ended_to: Option<NaiveDate>,
}

fn parse_column_filter(s: &str) -> Result<(usize, String), String> {
    let (index, text) = s
        .split_once(':')
        .ok_or_else(|| format!("expected INDEX:TEXT, got {s:?}"))?;
    let index = index
        .parse()
        .map_err(|_| format!("invalid column index {index:?}"))?;
    Ok((index, text.to_string()))
}

impl FilterArgs {
    /// Fills the filter inputs and runs them through the filter controller.
    fn apply<R: Record>(&self, ctx: &mut Context<R>) {
        let mut inputs = InputState::new();
        inputs.set_value(GLOBAL_FILTER, self.search.clone().unwrap_or_default());
        inputs.set_checked(GLOBAL_REGEX, self.regex);
        for (index, text) in &self.columns {
            inputs.set_value(column_filter_id(*index), text.clone());
        }
        for index in &self.column_regex {
            inputs.set_checked(column_regex_id(*index), true);
        }

        let ranges = [
            (DateField::Created, self.created_from, self.created_to),
            (DateField::Started, self.started_from, self.started_to),
            (DateField::Ended, self.ended_from, self.ended_to),
        ];
        for (field, from, to) in ranges {
            if from.is_none() && to.is_none() {
                continue;
            }
            if !R::date_fields().contains(&field) {
                warn!("Ignoring {} date range: these rows have no such date", field.label());
                continue;
            }
            inputs.set_value(date_start_id(field), from.map(|d| d.to_string()).unwrap_or_default());
            inputs.set_value(date_end_id(field), to.map(|d| d.to_string()).unwrap_or_default());
            apply_date_filter(ctx, &inputs, field);
        }

        apply_global_filter(ctx, &inputs);
        for (index, _) in &self.columns {
            if *index >= R::columns().len() {
                warn!("Ignoring filter on column {}: there are {} columns", index, R::columns().len());
            }
            apply_column_filter(ctx, &inputs, *index);
        }
    }
}

#[derive(Debug, Args)]
struct ViewArgs {
    /// Sort by column index
    #[arg(long)]
    sort: Option<usize>,
    /// Sort descending
    #[arg(long)]
    desc: bool,
    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Show every matching row instead of one page
    #[arg(long)]
    all: bool,
    /// Also write the matching rows to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

impl ViewArgs {
    fn show<R: Record>(&self, ctx: &mut Context<R>) -> Result<()> {
        if self.all {
            print_table(ctx.table.visible());
        } else {
            ctx.table.set_page(self.page.saturating_sub(1));
            print_table(ctx.table.page_rows());
            print_summary(&ctx.table);
        }
        if let Some(path) = &self.csv {
            let written = export_rows_to_csv(path, ctx.table.visible())
                .with_context(|| format!("could not export to {}", path.display()))?;
            println!("Exported {} row(s) to {}", written, path.display());
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
struct SelectArgs {
    /// Primary keys to act on
    pks: Vec<Pk>,
    /// Act on every row matching the filters
    #[arg(long)]
    matching: bool,
    #[command(flatten)]
    filters: FilterArgs,
    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

impl SelectArgs {
    fn context<R: Record>(&self, rows: Vec<R>) -> Context<R> {
        let mut ctx = Context::new(Table::new(rows));
        self.filters.apply(&mut ctx);
        for pk in &self.pks {
            if !ctx.table.select(*pk) {
                warn!("No listed row has PK {}; skipping it", pk);
            }
        }
        if self.matching {
            ctx.table.select_visible();
        }
        ctx
    }
}

/// Terminal prompts.
struct Terminal {
    assume_yes: bool,
}

impl Confirm for Terminal {
    fn confirm(&mut self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        match Prompt::new()
            .with_prompt(message)
            .default(false)
            .interact_on(&Term::stderr())
        {
            Ok(answer) => answer,
            Err(e) => {
                error!("Prompt failed: {}", e);
                false
            }
        }
    }

    fn alert(&mut self, message: &str) {
        println!("{}", message);
    }
}

fn settings(args: &Cli) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_path(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(server) = &args.server {
        settings.server = server.clone();
    }
    Ok(settings)
}

fn build_context<R: Record>(rows: Vec<R>, page_len: usize, filters: &FilterArgs, view: &ViewArgs) -> Context<R> {
    let mut table = Table::new(rows).with_page_len(page_len);
    if let Some(column) = view.sort {
        table.order(column, if view.desc { SortDir::Desc } else { SortDir::Asc });
    }
    let mut ctx = Context::new(table);
    filters.apply(&mut ctx);
    ctx
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let directives = match args.verbose {
        0 => "warn",
        1 => "common=info,scanctl=info",
        _ => "common=debug,scanctl=debug",
    };
    logging::init(directives, std::io::stderr)?;

    let settings = settings(&args)?;
    let network = NetworkClient::new(&settings)?;

    match args.command {
        Commands::ListScans {
            scanner,
            filters,
            view,
        } => {
            let rows = match scanner {
                Some(pk) => network.child_scans(pk).await?,
                None => network.scans().await?,
            };
            let mut ctx = build_context(rows, settings.page_length, &filters, &view);
            view.show(&mut ctx)?;
        }
        Commands::ListScanners { filters, view } => {
            let rows = network.scanners().await?;
            let mut ctx = build_context(rows, settings.page_length, &filters, &view);
            view.show(&mut ctx)?;
        }
        Commands::Scan { command, select } => {
            let mut ctx = select.context(network.scans().await?);
            let mut terminal = Terminal {
                assume_yes: select.yes,
            };
            let command = Command::parse(&command);
            let outcome = dispatch_scan_command(&mut ctx.table, &mut terminal, &network, command).await?;
            if outcome.is_none() {
                println!("Nothing done");
            } else if ctx.table.is_stale() {
                ctx.reload(network.scans().await?);
                let pks = ctx.table.selected_pks();
                print_table(ctx.table.rows().iter().filter(|r| pks.contains(&r.pk)));
            }
        }
        Commands::Scanner { command, select } => {
            let mut ctx = select.context(network.scanners().await?);
            let mut terminal = Terminal {
                assume_yes: select.yes,
            };
            let command = Command::parse(&command);
            if dispatch_scanner_command(&mut ctx.table, &mut terminal, &network, command)
                .await?
                .is_none()
            {
                println!("Nothing done");
            }
        }
        Commands::Download { select, output } => {
            let mut ctx = select.context(network.scans().await?);
            let mut terminal = Terminal {
                assume_yes: select.yes,
            };
            match trigger_batch_download(&mut ctx.table, &mut terminal, &network).await? {
                Some(download) => {
                    let path = output.unwrap_or_else(|| PathBuf::from(&download.filename));
                    fs::write(&path, &download.bytes)
                        .with_context(|| format!("could not save {}", path.display()))?;
                    println!("Saved {} bytes to {}", download.bytes.len(), path.display());
                }
                None => println!("Nothing done"),
            }
        }
    }

    Ok(())
}
