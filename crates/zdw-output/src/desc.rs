use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;
use zdw_decoder::{DecodeEngine, DecodeError};

use crate::config::OutputConfig;
use crate::error::OutputError;

/// Write the schema of `engine`'s projection with the configured
/// separator and delimiter.
///
/// # Errors
///
/// The engine's schema errors, or [`DecodeError::Output`] if `out` fails.
pub fn write_desc<W: Write + ?Sized>(
    engine: &DecodeEngine,
    out: &mut W,
    config: &OutputConfig,
) -> Result<(), DecodeError> {
    engine.write_schema(out, &config.desc_separator, &config.desc_delimiter)
}

/// Write `<dir>/<basename>.desc.<ext>` and return its path.
///
/// The schema is rendered before the file is created, so a projection
/// error leaves no file behind.
///
/// # Errors
///
/// - [`DecodeError::HeaderNotReadYet`] / [`DecodeError::NoColumnsToOutput`].
/// - [`DecodeError::FileCreation`] if the file cannot be written.
pub fn write_desc_file(engine: &DecodeEngine, config: &OutputConfig) -> Result<PathBuf, DecodeError> {
    let mut rendered = Vec::new();
    write_desc(engine, &mut rendered, config)?;

    let path = config.desc_path(engine.base_name());
    fs::write(&path, &rendered).map_err(|source| OutputError::Create {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), columns = engine.num_output_columns(), "wrote desc file");
    Ok(path)
}
