/// Implementation of `zdw desc`.
///
/// Reads only the header of each input and writes the desc file for the
/// selected columns; `--stdout` prints it instead.
use anyhow::{Context, Result};
use zdw_output::{FileUnconverter, UnconvertOptions};

use crate::{UnconvertArgs, for_each_input, open_engine};

/// Run `zdw desc` over every input.
///
/// # Errors
///
/// Returns the first failing input's error after all inputs were tried.
pub fn run(args: &UnconvertArgs, options: UnconvertOptions) -> Result<()> {
    let options = UnconvertOptions {
        desc_only: true,
        ..options
    };
    let selection = args.input.selection();
    for_each_input(&args.input.files, |path| {
        let engine = open_engine(path)?;
        FileUnconverter::new(engine, args.output_config(), options)
            .run(&selection)
            .with_context(|| format!("describing {}", path.display()))?;
        Ok(())
    })
}
