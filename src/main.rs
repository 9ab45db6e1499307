use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use chrono::Local;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use serde::Serialize;
use tracing::{info, info_span};
use tracing_error::{ErrorLayer, ExtractSpanTrace, TracedError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fleet_table::controller::Controller;
use fleet_table::domain::{TableConfig, TableError};
use fleet_table::fleet::{self, Administrator, Document, DocumentForm, Vehicle, VehicleForm};
use fleet_table::loader::{DataRecord, load_data_file};
use fleet_table::model::{Model, Status};
use fleet_table::prefs::{FileStorage, MemoryStorage, Preferences, PreferencesStore};
use fleet_table::record::Record;
use fleet_table::table::{RowForm, SmartTable};
use fleet_table::ui::TableUI;

/// Overrides `--log-level`, EnvFilter syntax.
const LOG_ENV: &str = "FLEET_TABLE_LOG";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dataset {
    Vehicles,
    Administrators,
    Documents,
}

/// Fleet dashboard tables in the terminal.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Built-in dataset to show
    #[arg(long, value_enum, default_value_t = Dataset::Vehicles)]
    dataset: Dataset,

    /// CSV, Parquet or Arrow file to show instead of a built-in dataset
    #[arg(long)]
    file: Option<String>,

    /// Number of generated vehicles (or administrators)
    #[arg(long, default_value_t = 120)]
    rows: usize,

    /// Seed of the generated data
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Page size used until one is stored
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Preference storage file [default: <config dir>/fleet-table/storage.json]
    #[arg(long)]
    storage: Option<String>,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: String,

    /// Show the filter panel docked to the side instead of as a popover
    #[arg(long)]
    drawer_filters: bool,

    #[arg(long, default_value = "fleet-table.log")]
    log_file: String,

    /// Log filter used when FLEET_TABLE_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Error: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }
    match run(args) {
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn report(error: &(dyn Error + 'static)) {
    eprintln!("Error: {error}");
    let mut source = Some(error);
    while let Some(err) = source {
        if let Some(span_trace) = err.span_trace() {
            eprintln!("{span_trace}");
        }
        source = err.source();
    }
}

fn expand_path(path: &str) -> Result<PathBuf, TableError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TableError::Validation(format!("Cannot expand {path}: {e}")))
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(args: &Args) -> Result<(), TableError> {
    let file = File::create(expand_path(&args.log_file)?)?;
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TracedError<TableError>> {
    let span = info_span!("fleet-table", dataset = ?args.dataset, file = ?args.file);
    let _entered = span.enter();

    let mut config = TableConfig::default()
        .with_page_size(args.page_size)
        .with_export_dir(expand_path(&args.export_dir)?)
        .with_drawer_filters(args.drawer_filters);
    let storage_path = match &args.storage {
        Some(path) => Some(expand_path(path)?),
        None => FileStorage::default_path(),
    };
    if let Some(path) = storage_path {
        config = config.with_storage_path(path);
    }
    let store: Box<dyn PreferencesStore> = match &config.storage_path {
        Some(path) => Box::new(Preferences::new(FileStorage::new(path.clone()))),
        None => Box::new(Preferences::new(MemoryStorage::new())),
    };
    info!("Starting fleet-table with {:?}", config);

    if let Some(file) = &args.file {
        let loaded = load_data_file(expand_path(file)?)?;
        let table: SmartTable<DataRecord> =
            SmartTable::new(loaded.name.clone(), loaded.rows.clone(), loaded.display_map(), store)
                .with_filters(loaded.filter_config());
        return Ok(run_table(finish(table, &config), None, &config)?);
    }

    let today = Local::now().date_naive();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let rows = args.rows;
    let seed = args.seed;
    // A refresh re-reads the telemetry: same fleet size, new readings.
    let reseed = move || StdRng::seed_from_u64(seed ^ Local::now().timestamp() as u64);

    match args.dataset {
        Dataset::Vehicles => {
            let table = SmartTable::new(
                "Vehicles",
                fleet::seed_vehicles(rows, &mut rng, today),
                fleet::vehicle_columns(today),
                store,
            )
            .with_row_id(|v: &Vehicle, _| v.id.clone())
            .with_filters(fleet::vehicle_filters(today))
            .with_actions(fleet::vehicle_actions(config.export_dir.clone()))
            .with_json_projection(fleet::vehicle_summary_json)
            .with_refresh(move || Ok(fleet::seed_vehicles(rows, &mut reseed(), today)));
            let form: Box<dyn RowForm<Vehicle>> = Box::new(VehicleForm { today });
            run_table(finish(table, &config), Some(form), &config)?;
        }
        Dataset::Administrators => {
            let table = SmartTable::new(
                "Administrators",
                fleet::seed_administrators(rows, &mut rng, today),
                fleet::administrator_columns(),
                store,
            )
            .with_row_id(|a: &Administrator, _| a.id.clone())
            .with_filters(fleet::administrator_filters())
            .with_actions(fleet::administrator_actions())
            .with_refresh(move || Ok(fleet::seed_administrators(rows, &mut reseed(), today)));
            run_table(finish(table, &config), None, &config)?;
        }
        Dataset::Documents => {
            let vehicles = fleet::seed_vehicles(rows, &mut rng, today);
            let table = SmartTable::new(
                "Documents",
                fleet::seed_documents(&vehicles, &mut rng, today),
                fleet::document_columns(today),
                store,
            )
            .with_row_id(|d: &Document, _| d.id.clone())
            .with_filters(fleet::document_filters(today))
            .with_actions(fleet::document_actions());
            let form: Box<dyn RowForm<Document>> = Box::new(DocumentForm { today });
            run_table(finish(table, &config), Some(form), &config)?;
        }
    }
    Ok(())
}

/// Settings shared by every table of the dashboard.
fn finish<T>(table: SmartTable<T>, config: &TableConfig) -> SmartTable<T>
where
    T: Record + Serialize + Send + Sync + 'static,
{
    table
        .with_drawer_filters(config.drawer_filters)
        .with_default_page_size(config.page_size)
}

fn run_table<T>(
    table: SmartTable<T>,
    form: Option<Box<dyn RowForm<T>>>,
    config: &TableConfig,
) -> Result<(), TableError>
where
    T: Record + Serialize + Send + Sync + 'static,
{
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, table, form, config);
    ratatui::restore();
    result
}

fn event_loop<T>(
    terminal: &mut DefaultTerminal,
    table: SmartTable<T>,
    form: Option<Box<dyn RowForm<T>>>,
    config: &TableConfig,
) -> Result<(), TableError>
where
    T: Record + Serialize + Send + Sync + 'static,
{
    let size = terminal.size()?;
    let mut model = Model::init(table, config, size.width as usize, size.height as usize)
        .with_form(form);
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model.raw_keyevents())?;
        model.update(message)?;
    }
    info!("Quitting {}", model.table().title());
    Ok(())
}
