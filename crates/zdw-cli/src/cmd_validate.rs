/// Implementation of `zdw validate`.
///
/// Decodes every row of each input and discards it. A file passes when
/// its header, every block and every dictionary reference decode cleanly
/// and nothing follows the last block.
///
/// # Output
///
/// ```text
/// ✓ hits.zdw.gz: 120000 rows in 3 blocks
/// ```
///
/// Failures are reported by the shared input loop on stderr.
use anyhow::{Context, Result};
use zdw_output::{FileUnconverter, OutputConfig, UnconvertOptions};

use crate::{InputArgs, for_each_input, open_engine};

/// Run `zdw validate` over every input.
///
/// # Errors
///
/// Returns the first failing input's error after all inputs were tried.
pub fn run(args: &InputArgs, options: UnconvertOptions) -> Result<()> {
    let options = UnconvertOptions {
        test_only: true,
        ..options
    };
    let selection = args.selection();
    for_each_input(&args.files, |path| {
        let engine = open_engine(path)?;
        let summary = FileUnconverter::new(engine, OutputConfig::default(), options)
            .run(&selection)
            .with_context(|| format!("validating {}", path.display()))?;
        if !options.quiet {
            println!(
                "✓ {}: {} row{} in {} block{}",
                path.display(),
                summary.rows,
                if summary.rows == 1 { "" } else { "s" },
                summary.blocks,
                if summary.blocks == 1 { "" } else { "s" },
            );
        }
        Ok(())
    })
}
