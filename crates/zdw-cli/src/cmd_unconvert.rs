/// Implementation of `zdw unconvert`.
///
/// Decodes each input into `<dir>/<basename>.<ext>` (one tab-separated
/// line per row) and `<dir>/<basename>.desc.<ext>` (one `name\ttype` line
/// per output column). With `--stdout` the rows go to stdout and no desc
/// file is written.
use anyhow::{Context, Result};
use zdw_output::{FileUnconverter, UnconvertOptions};

use crate::{UnconvertArgs, for_each_input, open_engine};

/// Run `zdw unconvert` over every input.
///
/// # Errors
///
/// Returns the first failing input's error after all inputs were tried.
pub fn run(args: &UnconvertArgs, options: UnconvertOptions) -> Result<()> {
    let selection = args.input.selection();
    for_each_input(&args.input.files, |path| {
        let engine = open_engine(path)?;
        let mut unconverter = FileUnconverter::new(engine, args.output_config(), options);
        let summary = unconverter
            .run(&selection)
            .with_context(|| format!("unconverting {}", path.display()))?;
        if let Some(data) = &summary.data_path {
            tracing::debug!(path = %data.display(), rows = summary.rows, "data file complete");
        }
        Ok(())
    })
}
