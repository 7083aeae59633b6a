//! Command implementations for the datadiff CLI

use crate::cell::EqualityMode;
use crate::cli::{Commands, DataOrigin, DiffArgs};
use crate::config::DiffOptions;
use crate::data::{DataProcessor, DuckDbResource, DEFAULT_CHUNK_SIZE};
use crate::driver::resolve_driver_columns;
use crate::engine::DataDiff;
use crate::error::{DiffError, Result};
use crate::output::{JsonDiff, JsonFormatter, PrettyPrinter};
use crate::report::{DiffColumn, ReportDensity, ReportStrategy};
use crate::resource::{attributes_table, DataResource, MemoryTable};
use crate::result::DiffResult;
use crate::structure::ColumnAttribute;
use log::{debug, info};
use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Execute a command
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Diff(args) => diff_command(&args),
        Commands::Describe {
            resource,
            database,
            key,
            json,
        } => describe_command(&resource, database.as_deref(), &key, json),
    }
}

/// Build the diff options: the options file, then the command-line flags
pub fn build_options(args: &DiffArgs) -> Result<DiffOptions> {
    let mut options = match &args.config {
        Some(path) => DiffOptions::from_json_file(path)?,
        None => DiffOptions::default(),
    };

    if !args.key.is_empty() {
        options.driver_columns = args.key.clone();
    }
    if let Some(equality) = &args.equality {
        options.equality = EqualityMode::parse(equality).map_err(DiffError::invalid_input)?;
    }
    if let Some(report) = &args.report {
        options.report = ReportStrategy::parse(report).map_err(DiffError::invalid_input)?;
    }
    if let Some(density) = &args.density {
        options.density = ReportDensity::parse(density).map_err(DiffError::invalid_input)?;
    }
    if let Some(max) = args.max_changes {
        options.max_change_count = Some(max);
    }
    if args.color {
        options.use_color = Some(true);
    } else if args.no_color || args.json {
        options.use_color = Some(false);
    }
    if let Some(prefix) = &args.prefix {
        options.column_prefix = prefix.clone();
    }
    if let Some(columns) = &args.columns {
        options.diff_columns = Some(DiffColumn::parse_list(columns).map_err(DiffError::invalid_input)?);
    }
    if args.null_is_not_blank {
        options.null_equals_blank = false;
    }
    options.show_progress = !args.json && std::io::stdout().is_terminal();

    Ok(options)
}

/// Compare two resources, or two directories of resources
fn diff_command(args: &DiffArgs) -> Result<()> {
    let origin = DataOrigin::parse(&args.data_origin).map_err(DiffError::invalid_input)?;
    let options = build_options(args)?;

    let source_path = Path::new(&args.source);
    let target_path = args.target.as_deref().map(Path::new);
    if source_path.is_dir() {
        return match target_path {
            Some(target) if target.is_dir() => diff_directories(source_path, target, args, origin, &options),
            _ => Err(DiffError::invalid_input(format!(
                "The source ({}) is a directory: the target must be a directory too",
                source_path.display()
            ))),
        };
    }

    let outcome = diff_pair(
        &args.source,
        args.target.as_deref(),
        args,
        origin,
        &options,
        args.output.as_deref(),
    )?;
    let equal = outcome.result.are_equal();
    print_outcome(&outcome, args.json)?;

    if args.fail && !equal {
        return Err(DiffError::NotEqual {
            source_name: outcome.result.source_name().to_string(),
            target_name: outcome.result.target_name().to_string(),
            changes: outcome.result.change_count(),
        });
    }
    Ok(())
}

/// One finished diff, with the settings needed to print it
struct PairOutcome {
    result: DiffResult,
    colors_column: Option<String>,
    use_color: bool,
}

fn print_outcome(outcome: &PairOutcome, json: bool) -> Result<()> {
    let result = &outcome.result;
    if json {
        println!("{}", JsonFormatter::format_diff(result.summary(), result.report())?);
        return Ok(());
    }

    PrettyPrinter::print_diff_summary(&result.summary());
    println!();
    match result.report() {
        Some(report) => {
            PrettyPrinter::print_report(report, outcome.colors_column.as_deref(), outcome.use_color)
        }
        None => PrettyPrinter::print_report(&result.summary_table()?, None, outcome.use_color),
    }
    Ok(())
}

/// Open a resource argument: a file path, or a table of the database
fn open_resource<'c>(processor: &'c DataProcessor, name: &str, has_database: bool) -> Result<DuckDbResource<'c>> {
    let path = Path::new(name);
    if path.is_file() {
        return processor.load(path);
    }
    if has_database {
        return processor.table(name);
    }
    Err(DiffError::invalid_input(format!("File not found: {}", name)))
}

fn new_processor(database: Option<&Path>) -> Result<DataProcessor> {
    match database {
        Some(path) => DataProcessor::open_existing(path, DEFAULT_CHUNK_SIZE),
        None => DataProcessor::new(),
    }
}

/// Diff one pair of resources in its own connection
fn diff_pair(
    source: &str,
    target: Option<&str>,
    args: &DiffArgs,
    origin: DataOrigin,
    options: &DiffOptions,
    output: Option<&Path>,
) -> Result<PairOutcome> {
    let processor = new_processor(args.database.as_deref())?;
    let has_database = args.database.is_some();
    let source = open_resource(&processor, source, has_database)?;
    let target = target
        .map(|t| open_resource(&processor, t, has_database))
        .transpose()?;

    let (diff, result) = match origin {
        DataOrigin::Record => {
            // Both sides are read sorted on the driver columns, then the other columns
            let drivers = resolve_driver_columns(source.name(), source.relation_def(), &options.driver_columns)?;
            let order = drivers.sort_positions();
            let source = source.ordered_by(order.clone());
            let target = target.map(|t| t.ordered_by(order));
            let diff = DataDiff::new(options.clone())?;
            let result = diff.diff(&source, target.as_ref().map(|t| t as &dyn DataResource))?;
            (diff, result)
        }
        DataOrigin::Structure => {
            let attribute = match options.driver_columns.first() {
                Some(name) => ColumnAttribute::parse(name).map_err(DiffError::invalid_input)?,
                None => ColumnAttribute::Name,
            };
            let relation_options = options.clone().with_driver_columns([attribute.column_name()]);
            let source_table = source.relation_def().columns_table(source.name(), attribute)?;
            let target_table = target
                .as_ref()
                .map(|t| t.relation_def().columns_table(t.name(), attribute))
                .transpose()?;
            diff_tables(relation_options, &source_table, target_table.as_ref())?
        }
        DataOrigin::Attributes => {
            let attribute_options = options.clone().with_driver_columns(["attribute"]);
            let source_table = attributes_table(&source)?;
            let target_table = target.as_ref().map(|t| attributes_table(t)).transpose()?;
            diff_tables(attribute_options, &source_table, target_table.as_ref())?
        }
    };

    if let (Some(path), Some(report)) = (output, result.report()) {
        // Staged in memory, the user's database is only read
        let table_name = report.name().to_string();
        let exporter = DataProcessor::new()?;
        exporter.write_table(report, &table_name)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        exporter.export_table(&table_name, path)?;
        info!("Report written to {}", path.display());
    }

    let resolved = diff.options();
    let colors_column = resolved
        .diff_columns
        .contains(&DiffColumn::Colors)
        .then(|| format!("{}{}", resolved.column_prefix, DiffColumn::Colors.name()));
    Ok(PairOutcome {
        result,
        colors_column,
        use_color: resolved.use_color,
    })
}

fn diff_tables(options: DiffOptions, source: &MemoryTable, target: Option<&MemoryTable>) -> Result<(DataDiff, DiffResult)> {
    let diff = DataDiff::new(options)?;
    let result = diff.diff(source, target.map(|t| t as &dyn DataResource))?;
    Ok((diff, result))
}

/// Supported files under a directory, as sorted relative paths
fn collect_files(root: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && DataProcessor::is_supported_format(entry.path()) {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.insert(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Diff the files of two directories, paired by relative path, in parallel
fn diff_directories(
    source_dir: &Path,
    target_dir: &Path,
    args: &DiffArgs,
    origin: DataOrigin,
    options: &DiffOptions,
) -> Result<()> {
    use rayon::prelude::*;

    let source_files = collect_files(source_dir)?;
    let target_files = collect_files(target_dir)?;
    let pairs: Vec<&PathBuf> = source_files.intersection(&target_files).collect();
    let only_in_source: Vec<String> = source_files
        .difference(&target_files)
        .map(|p| p.display().to_string())
        .collect();
    let only_in_target: Vec<String> = target_files
        .difference(&source_files)
        .map(|p| p.display().to_string())
        .collect();
    debug!(
        "{} file pairs, {} only in the source, {} only in the target",
        pairs.len(),
        only_in_source.len(),
        only_in_target.len()
    );

    // Progress spinners would interleave between parallel runs
    let options = options.clone().with_progress(false);
    let outcomes: Vec<Result<PairOutcome>> = pairs
        .par_iter()
        .map(|relative| {
            let source = source_dir.join(relative);
            let target = target_dir.join(relative);
            let output = args
                .output
                .as_ref()
                .map(|dir| dir.join(relative).with_extension("csv"));
            diff_pair(
                &source.to_string_lossy(),
                Some(&target.to_string_lossy()),
                args,
                origin,
                &options,
                output.as_deref(),
            )
        })
        .collect();
    let outcomes = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

    let all_equal = outcomes.iter().all(|o| o.result.are_equal())
        && only_in_source.is_empty()
        && only_in_target.is_empty();

    if args.json {
        let diffs: Vec<JsonDiff> = outcomes
            .iter()
            .map(|o| JsonDiff {
                summary: o.result.summary(),
                report: o.result.report().map(JsonFormatter::report_rows),
            })
            .collect();
        let json = serde_json::json!({
            "equal": all_equal,
            "diffs": diffs,
            "only_in_source": only_in_source,
            "only_in_target": only_in_target,
        });
        println!("{}", JsonFormatter::format(&json)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome, false)?;
            println!();
        }
        PrettyPrinter::print_unmatched("source", &only_in_source);
        PrettyPrinter::print_unmatched("target", &only_in_target);
    }

    if args.fail && !all_equal {
        let changes = outcomes.iter().map(|o| o.result.change_count()).sum::<u64>()
            + (only_in_source.len() + only_in_target.len()) as u64;
        return Err(DiffError::NotEqual {
            source_name: source_dir.display().to_string(),
            target_name: target_dir.display().to_string(),
            changes,
        });
    }
    Ok(())
}

/// Show the structure of a resource and the driver columns of a diff
fn describe_command(resource: &str, database: Option<&Path>, key: &[String], json: bool) -> Result<()> {
    let processor = new_processor(database)?;
    let resource = open_resource(&processor, resource, database.is_some())?;
    let relation = resource.relation_def();
    let drivers = resolve_driver_columns(resource.name(), relation, key)?;

    if json {
        let description = serde_json::json!({
            "name": resource.name(),
            "columns": relation.columns(),
            "primary_key": relation.primary_key().map(|pk| relation.names_at(pk)),
            "unique_keys": relation
                .unique_keys()
                .iter()
                .map(|k| relation.names_at(k))
                .collect::<Vec<_>>(),
            "driver_columns": relation.names_at(drivers.positions()),
            "driver_source": drivers.source(),
            "row_count": resource.row_count()?,
        });
        println!("{}", JsonFormatter::format(&description)?);
    } else {
        PrettyPrinter::print_structure(resource.name(), relation, &drivers);
        println!("   Rows: {}", resource.row_count()?);
    }
    Ok(())
}
