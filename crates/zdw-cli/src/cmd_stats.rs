/// Implementation of `zdw stats`.
///
/// Reads only the header of each input and prints its format version,
/// compression wrapper and column layout. No rows are decoded.
///
/// # Example output
///
/// ```text
/// File:        hits.zdw.gz
/// Version:     11  (gzip)
/// Columns:     3
///
/// #   Name          Type        Desc type
/// ───────────────────────────────────────────────────────
/// 0   url           Varchar     varchar(255)
/// 1   hits          Long        int(11) unsigned
/// 2   visitor       LongLong    bigint(20) unsigned
/// ```
///
/// With `--json` one pretty-printed [`FileStats`] document is printed per
/// file instead.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use zdw_decoder::DecodeError;
use zdw_wire::Compression;

use crate::{StatsArgs, for_each_input, open_engine};

/// Header summary of one input.
#[derive(Debug, Serialize)]
pub struct FileStats {
    pub file: String,
    pub base_name: String,
    pub version: u16,
    pub compression: &'static str,
    pub decimal_factor: Option<f64>,
    pub columns: Vec<ColumnStats>,
}

#[derive(Debug, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub column_type: String,
    pub desc_type: String,
}

/// Run `zdw stats` over every input.
///
/// # Errors
///
/// Returns the first failing input's error after all inputs were tried.
pub fn run(args: &StatsArgs) -> Result<()> {
    for_each_input(&args.files, |path| {
        let stats = collect(path).with_context(|| format!("reading header of {}", path.display()))?;
        if args.json {
            let json = serde_json::to_string_pretty(&stats).context("serializing stats")?;
            println!("{json}");
        } else {
            print_table(&stats);
        }
        Ok(())
    })
}

fn collect(path: &Path) -> Result<FileStats, DecodeError> {
    let mut engine = open_engine(path)?;
    engine.read_header()?;
    let compression = match engine.compression() {
        Some(Compression::Gzip) => "gzip",
        Some(Compression::Zstd) => "zstd",
        Some(Compression::None) | None => "none",
    };
    let catalog = engine
        .catalog()
        .ok_or_else(|| DecodeError::Processing("header missing after read".into()))?;

    Ok(FileStats {
        file: path.display().to_string(),
        base_name: engine.base_name().to_string(),
        version: catalog.version().raw(),
        compression,
        decimal_factor: catalog.decimal_factor(),
        columns: catalog
            .columns()
            .iter()
            .map(|column| ColumnStats {
                name: column.name.clone(),
                column_type: format!("{:?}", column.column_type),
                desc_type: column.desc_type(),
            })
            .collect(),
    })
}

fn print_table(stats: &FileStats) {
    println!("File:        {}", stats.file);
    println!("Version:     {}  ({})", stats.version, stats.compression);
    if let Some(factor) = stats.decimal_factor {
        println!("Decimals:    /{factor}");
    }
    println!("Columns:     {}", stats.columns.len());
    println!();

    let name_width = stats
        .columns
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("{:<3} {:<name_width$}  {:<14}  Desc type", "#", "Name", "Type");
    println!("{}", "─".repeat(name_width + 40));
    for (i, column) in stats.columns.iter().enumerate() {
        println!(
            "{:<3} {:<name_width$}  {:<14}  {}",
            i, column.name, column.column_type, column.desc_type
        );
    }
    println!();
}
