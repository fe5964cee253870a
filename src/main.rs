//! CLI entry point for the rental trends tool.
//!
//! Provides subcommands for building the population/rent chart series,
//! comparing household incomes with rents, rating mortgage payments,
//! summarizing urban rental markets and rent trends, and inspecting a dataset.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rental_trends::compare::income::cities_for_selection;
use rental_trends::compare::mortgage::{DEFAULT_ANNUAL_INCOME, national_series};
use rental_trends::compare::{
    self, AffordabilityReport, CityRentTrend, IncomeIndex, MortgageTimeseries, PopulationIndex, RentIndex,
    Selection, TARGET_YEAR, merge_markets,
};
use rental_trends::fetch::{BasicClient, HttpClient, load_source};
use rental_trends::normalize::{LocationFormat, MappedRow, RawRecord, read_table};
use rental_trends::output::{ChartReport, append_records, bucket_rows, print_json, write_json};
use rental_trends::pipeline::controls;
use rental_trends::pipeline::{BoundaryStrategy, Pipeline, PipelineConfig};
use rental_trends::schema::FieldMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOAD_ERROR_MESSAGE: &str = "Error loading visualization data.";

#[derive(Parser)]
#[command(name = "rental_trends")]
#[command(about = "Builds rent and population chart series from housing tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the stacked population/rent change series
    Chart {
        /// Path or URL of the rent survey CSV
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// JSON file mapping logical fields to column headers
        #[arg(long)]
        field_map: Option<String>,

        /// Roll up the cities of this province instead of provinces
        #[arg(short, long)]
        province: Option<String>,

        /// Structure type to leave out (checkbox id such as A6P, or full label)
        #[arg(long)]
        exclude_structure: Vec<String>,

        /// Unit type to leave out (checkbox id such as bachelor, or full label)
        #[arg(long)]
        exclude_unit: Vec<String>,

        /// Number of population-change buckets
        #[arg(short, long, default_value_t = rental_trends::pipeline::config::DEFAULT_BUCKET_COUNT)]
        buckets: usize,

        /// Align bucket boundaries on round tick values
        #[arg(long, default_value_t = false)]
        nice: bool,

        /// Write the JSON report here instead of logging it
        #[arg(long)]
        json_out: Option<String>,

        /// CSV file to append bucket cells to
        #[arg(long)]
        csv_out: Option<String>,
    },
    /// Compare monthly household income with rents per city
    Compare {
        /// Path or URL of the rent price CSV
        rent: String,

        /// Path or URL of the income CSV
        income: String,

        /// Reference year
        #[arg(short, long, default_value_t = TARGET_YEAR)]
        year: i32,

        /// Economic family type (defaults to the first one in the table)
        #[arg(short, long)]
        family: Option<String>,

        /// Income source to include (defaults to all)
        #[arg(long)]
        income_source: Vec<String>,

        /// City to include (defaults to every city with rent and income data)
        #[arg(long)]
        city: Vec<String>,

        /// Field map for the rent table
        #[arg(long)]
        rent_map: Option<String>,

        /// Field map for the income table
        #[arg(long)]
        income_map: Option<String>,

        /// Write the comparison JSON here instead of logging it
        #[arg(long)]
        json_out: Option<String>,
    },
    /// Rate quarterly mortgage payments against an annual household income
    Afford {
        /// Path or URL of the mortgage timeseries JSON
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Annual household income
        #[arg(short, long, default_value_t = DEFAULT_ANNUAL_INCOME)]
        income: f64,

        /// Quarter to report, such as 2025Q2 (defaults to the latest)
        #[arg(short, long)]
        quarter: Option<String>,

        /// Report the national average for every quarter instead
        #[arg(long, default_value_t = false)]
        series: bool,

        /// Write the JSON report here instead of logging it
        #[arg(long)]
        json_out: Option<String>,
    },
    /// Join vacancy rates, average rents and populations per urban centre
    Markets {
        /// Path or URL of the vacancy rate survey CSV
        vacancy: String,

        /// Path or URL of the average rent survey CSV
        rent: String,

        /// Path or URL of the population estimates CSV
        population: String,

        /// Population reference year
        #[arg(short, long, default_value_t = TARGET_YEAR)]
        year: i32,

        /// Centre to keep (defaults to all)
        #[arg(long)]
        city: Vec<String>,

        /// Field map shared by the two survey tables
        #[arg(long)]
        survey_map: Option<String>,

        /// Field map for the population table
        #[arg(long)]
        population_map: Option<String>,

        /// Write the markets JSON here instead of logging it
        #[arg(long)]
        json_out: Option<String>,
    },
    /// Average rent per city and year across housing types
    RentTrend {
        /// Path or URL of the merged city rent CSV
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// JSON file mapping logical fields to column headers
        #[arg(long)]
        field_map: Option<String>,

        /// Write the trend JSON here instead of logging it
        #[arg(long)]
        json_out: Option<String>,
    },
    /// List provinces, cities and filter types found in a rent survey CSV
    Inspect {
        /// Path or URL of the rent survey CSV
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// JSON file mapping logical fields to column headers
        #[arg(long)]
        field_map: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/rental_trends.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rental_trends.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let client = BasicClient::new()?;

    match cli.command {
        Commands::Chart {
            source,
            field_map,
            province,
            exclude_structure,
            exclude_unit,
            buckets,
            nice,
            json_out,
            csv_out,
        } => {
            let map = field_map_or(field_map.as_deref(), FieldMap::rent_survey)?;
            let rows = load_table(&client, &source, &map).await?;
            let raws: Vec<RawRecord> = rows.iter().map(RawRecord::from_row).collect();
            let (pipeline, report) = Pipeline::from_raw(&raws, LocationFormat::default());

            info!(
                rows = report.rows,
                records = report.records,
                skipped_location = report.skipped_location,
                skipped_year = report.skipped_year,
                "Dataset normalized"
            );

            let mut config = pipeline.default_config().with_bucket_count(buckets);
            if nice {
                config = config.with_boundaries(BoundaryStrategy::Nice);
            }
            config = exclude(config, &exclude_structure, &exclude_unit)?;
            if let Some(province) = province {
                config = pipeline.select_province(&config, &province)?;
            }

            let output = pipeline.run(&config);
            let chart = ChartReport::new(&report, &config, &output);

            emit(json_out.as_deref(), &chart)?;

            if let Some(path) = csv_out {
                let rows = bucket_rows(&output);
                append_records(&path, &rows)?;
                info!(path = %path, rows = rows.len(), "Bucket cells appended");
            }
        }
        Commands::Compare {
            rent,
            income,
            year,
            family,
            income_source,
            city,
            rent_map,
            income_map,
            json_out,
        } => {
            let rent_map = field_map_or(rent_map.as_deref(), FieldMap::rent_prices)?;
            let income_map = field_map_or(income_map.as_deref(), FieldMap::income)?;

            let rent_index = RentIndex::from_rows(&load_table(&client, &rent, &rent_map).await?, year);
            let income_index =
                IncomeIndex::from_rows(&load_table(&client, &income, &income_map).await?, year);

            let mut selection = match family {
                Some(family) => Selection::for_family(&income_index, &rent_index, family),
                None => Selection::initial(&income_index, &rent_index)
                    .context("income table has no family types for the selected year")?,
            };
            if !income_source.is_empty() {
                selection.sources = income_source.into_iter().collect();
                selection.cities = cities_for_selection(
                    &income_index,
                    &rent_index,
                    &selection.family_type,
                    &selection.sources,
                )
                .into_iter()
                .collect();
            }
            if !city.is_empty() {
                selection.cities = city.into_iter().collect();
            }

            let rows = compare::compare(&income_index, &rent_index, &selection);
            if rows.is_empty() {
                warn!(family = %selection.family_type, "No overlapping rent data for the current selection");
            }

            for row in &rows {
                info!(
                    city = %row.city,
                    monthly_income = row.monthly_income.round(),
                    unit_kinds = row.rents.len(),
                    "Comparison row"
                );
            }

            emit(json_out.as_deref(), &rows)?;
        }
        Commands::Afford {
            source,
            income,
            quarter,
            series,
            json_out,
        } => {
            if !(income > 0.0) {
                bail!("income must be positive, got {}", income);
            }
            let timeseries = load_with(&client, &source, MortgageTimeseries::from_json).await?;

            if series {
                let points = national_series(&timeseries, income);
                info!(quarters = points.len(), income, "National affordability series");
                return emit(json_out.as_deref(), &points);
            }

            let index = match quarter {
                Some(quarter) => timeseries
                    .quarter_index(&quarter)
                    .with_context(|| format!("quarter {} not in timeseries", quarter))?,
                None => timeseries.latest().context("timeseries has no quarters")?,
            };
            let snapshot = timeseries
                .snapshot(index)
                .context("quarter index out of range")?;
            let report = AffordabilityReport::new(&snapshot, income);

            if let Some(national) = &report.national {
                info!(
                    quarter = %report.quarter,
                    payment = national.payment,
                    percent = national.affordability.percent,
                    status = national.affordability.status.label(),
                    "National average"
                );
            }
            if let (Some(most), Some(least)) = (&report.most_affordable, &report.least_affordable) {
                info!(most = %most.name, least = %least.name, "Province extremes");
            }

            emit(json_out.as_deref(), &report)?;
        }
        Commands::Markets {
            vacancy,
            rent,
            population,
            year,
            city,
            survey_map,
            population_map,
            json_out,
        } => {
            let survey_map = field_map_or(survey_map.as_deref(), FieldMap::market_survey)?;
            let population_map = field_map_or(population_map.as_deref(), FieldMap::population)?;

            let vacancy_rows = load_table(&client, &vacancy, &survey_map).await?;
            let rent_rows = load_table(&client, &rent, &survey_map).await?;
            let populations =
                PopulationIndex::from_rows(&load_table(&client, &population, &population_map).await?, year);
            if populations.is_empty() {
                warn!(year, "No metro populations for the selected year");
            }

            let mut markets = merge_markets(&vacancy_rows, &rent_rows, &populations);
            if !city.is_empty() {
                markets.retain(|m| city.contains(&m.city));
            }

            for market in &markets {
                info!(
                    city = %market.city,
                    province = %market.province,
                    vacancy_rate = market.vacancy_rate,
                    avg_rent = market.avg_rent,
                    population = ?market.population,
                    high_vacancy = market.high_vacancy,
                    "Market"
                );
            }

            emit(json_out.as_deref(), &markets)?;
        }
        Commands::RentTrend {
            source,
            field_map,
            json_out,
        } => {
            let map = field_map_or(field_map.as_deref(), FieldMap::city_rents)?;
            let trend = CityRentTrend::from_rows(&load_table(&client, &source, &map).await?);

            let points = trend.points();
            info!(
                cities = trend.cities().count(),
                years = trend.years().len(),
                range = ?trend.range(),
                "Rent trend built"
            );

            emit(json_out.as_deref(), &points)?;
        }
        Commands::Inspect { source, field_map } => {
            let map = field_map_or(field_map.as_deref(), FieldMap::rent_survey)?;
            let rows = load_table(&client, &source, &map).await?;
            let raws: Vec<RawRecord> = rows.iter().map(RawRecord::from_row).collect();
            let (pipeline, report) = Pipeline::from_raw(&raws, LocationFormat::default());

            for province in pipeline.provinces() {
                let cities = pipeline.cities(province);
                info!(province, cities = cities.len(), "Province");
                for city in cities {
                    info!(province, city = %city, "City");
                }
            }
            for kind in pipeline.structure_types() {
                info!(structure = %kind, "Structure type");
            }
            for kind in pipeline.unit_types() {
                info!(unit = %kind, "Unit type");
            }

            info!(
                rows = report.rows,
                records = report.records,
                provinces = pipeline.provinces().count(),
                skipped_location = report.skipped_location,
                skipped_year = report.skipped_year,
                "Dataset summary"
            );
        }
    }

    Ok(())
}

fn field_map_or(path: Option<&str>, preset: fn() -> FieldMap) -> Result<FieldMap> {
    match path {
        Some(path) => FieldMap::load(path),
        None => Ok(preset()),
    }
}

/// Writes `value` to `path` as JSON, or logs it when no path is given.
fn emit<T: serde::Serialize>(path: Option<&str>, value: &T) -> Result<()> {
    match path {
        Some(path) => {
            write_json(path, value)?;
            info!(path, "JSON written");
            Ok(())
        }
        None => print_json(value),
    }
}

/// Loads one source and parses it; failures are logged and reported with a
/// fixed message.
#[tracing::instrument(skip(client, parse))]
async fn load_with<C, T, F>(client: &C, source: &str, parse: F) -> Result<T>
where
    C: HttpClient,
    F: FnOnce(&[u8]) -> Result<T>,
{
    let loaded = load_source(client, source).await.and_then(|bytes| parse(&bytes));

    loaded.map_err(|e| {
        error!(error = %e, "Failed to load dataset");
        e.context(LOAD_ERROR_MESSAGE)
    })
}

async fn load_table<C: HttpClient>(client: &C, source: &str, map: &FieldMap) -> Result<Vec<MappedRow>> {
    load_with(client, source, |bytes| read_table(bytes, map)).await
}

/// Switches off the given structure and unit types, accepting checkbox ids
/// or full labels.
fn exclude(config: PipelineConfig, structures: &[String], units: &[String]) -> Result<PipelineConfig> {
    let config = structures
        .iter()
        .try_fold(config, |config, id| controls::exclude_structure(&config, id))?;
    units.iter().try_fold(config, |config, id| controls::exclude_unit(&config, id))
}
