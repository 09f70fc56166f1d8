use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use ma_county_rollup::aggregator::CountyAggregator;
use ma_county_rollup::feed::EnrollmentFeed;
use ma_county_rollup::models::{CatchAllMode, Config, DataSourceMode};
use ma_county_rollup::normalizer::{self, NameNormalizer};
use ma_county_rollup::report;
use std::fs;
use std::path::Path;

const PREVIEW_ROWS: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("ma-county-rollup")
        .version("0.1")
        .about("Consolidates Medicare Advantage enrollment by parent company, one row per county")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("CSV")
                .help("Enrollment CSV to read instead of the configured input_file"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .value_parser(clap::value_parser!(CatchAllMode))
                .help("How to handle organizations matching no rule"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} and run the program again.", config_file);
        return Ok(());
    };

    if let Some(input) = matches.get_one::<String>("input") {
        config.data_source_mode = DataSourceMode::Local;
        config.input_file = Some(input.clone());
    }
    if let Some(mode) = matches.get_one::<CatchAllMode>("mode") {
        config.catch_all = *mode;
    }
    config.validate()?;

    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;

    println!("🧮 Catch-all mode: {:?}", config.catch_all);
    println!("📄 Output directory: {}", output_dir);

    let feed = EnrollmentFeed::new();
    let rows = match config.data_source_mode {
        DataSourceMode::Local => {
            let input_file = config.input_file.as_deref().unwrap_or_default();
            println!("📂 Reading enrollment data from: {}", input_file);
            feed.read_file(input_file)?
        }
        DataSourceMode::Internet => {
            let url = config.input_url.as_deref().unwrap_or_default();
            feed.fetch_url(url).await?
        }
    };

    let rules = config.rules.clone().unwrap_or_else(normalizer::default_rules);
    let aggregator = CountyAggregator::new(NameNormalizer::new(rules, config.catch_all, config.other_label()));
    log::debug!("Using {} grouping rules", aggregator.normalizer().rules().len());

    let table = aggregator.aggregate(&rows)?;
    log::info!(
        "Aggregated {} rows into {} counties ({} dropped without FIPS, {} suppressed cells)",
        table.stats.rows_read,
        table.rows.len(),
        table.stats.dropped_missing_fips,
        table.stats.suppressed_cells
    );

    let columns = report::resolve_columns(&table, config.output_columns.as_deref())?;
    let county_path = Path::new(output_dir).join(report::COUNTY_REPORT_FILE);
    report::write_county_report(&table, &columns, &county_path)?;
    println!("✅ County report written to: {}", county_path.display());

    if config.top_groups > 0 {
        let totals = aggregator.rank_groups(&table, config.top_groups);
        let top_path = Path::new(output_dir).join(report::TOP_GROUPS_FILE);
        report::write_top_groups(&totals, &top_path)?;
        println!("✅ Top {} groups written to: {}", config.top_groups, top_path.display());
        for (i, total) in totals.iter().enumerate() {
            println!("   {}. {} - {}", i + 1, total.group, total.total_enrolled);
        }
    }

    report::print_preview(&table, &columns, PREVIEW_ROWS);

    println!("\n✅ Rollup complete!");
    Ok(())
}
