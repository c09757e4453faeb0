//! odapi CLI - compile and run indicator exports
//!
//! Usage:
//!   odapi compile --geo-code <level> [--indicator-id <id>] [--dialect <dialect>]
//!   odapi export --geo-code <level> [--indicator-id <id>] [--format <format>] [--out <file>]
//!   odapi values --geo-code <level> [--as-of-date <date>]
//!   odapi snapshot --geo-code <level> --year <year>
//!   odapi catalog --geo-code <level> [--tree]
//!   odapi check-schema
//!
//! Examples:
//!   odapi compile --geo-code polg --indicator-id 1 --dialect postgres
//!   odapi export --geo-code polg --geo-value 230 --geometry-mode point --out winterthur.geojson
//!   odapi catalog --geo-code kant --tree

use clap::{Args, Parser, Subcommand, ValueEnum};
use odapi::config::Settings;
use odapi::planner::{render_tree, CompileOptions, QueryCompiler};
use odapi::request::{parse_geo_level, ExportParams, ExportRequest, SnapshotParams, ValuesParams};
use odapi::service::{ExportResponse, ExportService};
use odapi::sql::Dialect;
use odapi::ServiceResult;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odapi")]
#[command(about = "odapi - Swiss geo indicator exports")]
#[command(version)]
struct Cli {
    /// Config file (default: $ODAPI_CONFIG, ./odapi.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL of an indicator or portrait export
    Compile {
        #[command(flatten)]
        query: IndicatorArgs,

        /// SQL dialect to generate (default: the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Run an indicator or portrait export
    Export {
        #[command(flatten)]
        query: IndicatorArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Export the latest value per indicator and entity
    Values {
        #[arg(long)]
        geo_code: String,

        /// Knowledge date (YYYY-MM-DD); omit for current rows
        #[arg(long)]
        as_of_date: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Export the geo dimension as it was in a given year
    Snapshot {
        #[arg(long)]
        geo_code: String,

        #[arg(long)]
        year: String,

        #[arg(long)]
        geometry_mode: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the indicators available for a geo level
    Catalog {
        #[arg(long)]
        geo_code: String,

        /// Print a topic tree instead of JSON
        #[arg(long)]
        tree: bool,
    },

    /// Verify the database against the schema registry
    CheckSchema,
}

#[derive(Args)]
struct IndicatorArgs {
    /// Indicator id; omit for a portrait of one entity
    #[arg(long)]
    indicator_id: Option<String>,

    /// Geo level: polg, bezk or kant
    #[arg(long)]
    geo_code: String,

    /// BFS id of one entity
    #[arg(long)]
    geo_value: Option<String>,

    /// Knowledge date (YYYY-MM-DD); omit for current rows
    #[arg(long)]
    as_of_date: Option<String>,

    /// Statistical reference period (YYYY-MM-DD)
    #[arg(long)]
    period_ref: Option<String>,

    /// Join indicator and source metadata
    #[arg(long)]
    join_indicator_meta: bool,

    /// Join names and parent ids of the geo hierarchy
    #[arg(long)]
    join_geo_meta: bool,

    /// point, border, border_simplified_10m, border_simplified_50m or border_simplified_100m
    #[arg(long)]
    geometry_mode: Option<String>,

    /// Expand every group dimension
    #[arg(long)]
    expand_all: bool,

    /// Expand individual group dimensions (1-4)
    #[arg(long = "expand-group", value_parser = clap::value_parser!(u8).range(1..=4))]
    expand_groups: Vec<u8>,

    #[command(flatten)]
    page: PageArgs,
}

impl IndicatorArgs {
    fn params(&self, format: Option<String>) -> ExportParams {
        let expanded = |n: u8| self.expand_groups.contains(&n);
        ExportParams {
            indicator_id: self.indicator_id.clone(),
            geo_code: Some(self.geo_code.clone()),
            geo_value: self.geo_value.clone(),
            as_of_date: self.as_of_date.clone(),
            period_ref: self.period_ref.clone(),
            join_indicator_meta: self.join_indicator_meta,
            join_geo_meta: self.join_geo_meta,
            geometry_mode: self.geometry_mode.clone(),
            expand_all: self.expand_all,
            expand_group_1: expanded(1),
            expand_group_2: expanded(2),
            expand_group_3: expanded(3),
            expand_group_4: expanded(4),
            offset: self.page.offset.clone(),
            limit: self.page.limit.clone(),
            format,
        }
    }
}

#[derive(Args)]
struct PageArgs {
    #[arg(long)]
    offset: Option<String>,

    #[arg(long)]
    limit: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// geojson, csv, spreadsheet or binary-columnar
    #[arg(short, long)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings);

    match cli.command {
        Commands::Compile { query, dialect } => cmd_compile(&settings, &query, dialect),
        Commands::Export { query, output } => {
            let params = query.params(output.format.clone());
            let request = match params.validate() {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Invalid parameters: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            cmd_export(&settings, request, output.out)
        }
        Commands::Values {
            geo_code,
            as_of_date,
            output,
        } => {
            let params = ValuesParams {
                geo_code: Some(geo_code),
                as_of_date,
                format: output.format.clone(),
                ..Default::default()
            };
            match params.validate() {
                Ok(request) => cmd_export(&settings, request, output.out),
                Err(e) => {
                    eprintln!("Invalid parameters: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Snapshot {
            geo_code,
            year,
            geometry_mode,
            output,
        } => {
            let params = SnapshotParams {
                geo_code: Some(geo_code),
                year: Some(year),
                geometry_mode,
                format: output.format.clone(),
                ..Default::default()
            };
            match params.validate() {
                Ok(request) => cmd_export(&settings, request, output.out),
                Err(e) => {
                    eprintln!("Invalid parameters: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Catalog { geo_code, tree } => cmd_catalog(&settings, &geo_code, tree),
        Commands::CheckSchema => cmd_check_schema(&settings),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, odapi::config::SettingsError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    if let Some(database) = &cli.database {
        settings.database.path = database.clone();
    }
    Ok(settings)
}

/// Logs go to stderr so exports can be piped from stdout.
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn runtime() -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => Some(rt),
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            None
        }
    }
}

fn cmd_compile(settings: &Settings, query: &IndicatorArgs, dialect: Option<DialectArg>) -> ExitCode {
    let request = match query.params(None).validate() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let schemas = match settings.database.schema_names() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let dialect = dialect.map_or(settings.database.dialect, Dialect::from);
    let compiler = QueryCompiler::global(CompileOptions::new(dialect, schemas));

    match compiler.compile(&request.query) {
        Ok(plan) => {
            println!("{}", plan.sql());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_export(settings: &Settings, request: ExportRequest, out: Option<PathBuf>) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };

    let result: ServiceResult<u64> = rt.block_on(async {
        let service = ExportService::from_settings(settings)?;
        let response = service.run(request).await?;
        write_response(response, out.as_ref()).await
    });

    match result {
        Ok(bytes) => {
            if let Some(path) = out {
                eprintln!("Wrote {} bytes to {}", bytes, path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Export failed ({}): {}", e.status_code(), e);
            ExitCode::FAILURE
        }
    }
}

async fn write_response(response: ExportResponse, out: Option<&PathBuf>) -> ServiceResult<u64> {
    match out {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .map_err(odapi::export::ExportError::from)?;
            response.write_to(&mut file).await
        }
        None => response.write_to(&mut tokio::io::stdout()).await,
    }
}

fn cmd_catalog(settings: &Settings, geo_code: &str, tree: bool) -> ExitCode {
    let level = match parse_geo_level(Some(geo_code)) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };

    let result = rt.block_on(async {
        let service = ExportService::from_settings(settings)?;
        service.catalog(level).await
    });

    let indicators = match result {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Catalog failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if tree {
        print!("{}", render_tree(&indicators));
        return ExitCode::SUCCESS;
    }
    match serde_json::to_string_pretty(&indicators) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to encode catalog: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check_schema(settings: &Settings) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };

    let result = rt.block_on(async {
        let service = ExportService::from_settings(settings)?;
        service.verify_schema().await
    });

    match result {
        Ok(()) => {
            println!("OK: {} matches the schema registry", settings.database.path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Schema check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
