use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use zdw_decoder::{BlockStatus, DecodeEngine, DecodeError, RowSink};

use crate::config::{ColumnSelection, OutputConfig, UnconvertOptions};
use crate::desc;
use crate::sink::{FileSink, OrderedFileSink};

/// What one unconversion produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnconvertSummary {
    pub base_name: String,
    pub rows: u64,
    pub blocks: u64,
    /// `None` for stdout, test-only and desc-only runs.
    pub data_path: Option<PathBuf>,
    pub desc_path: Option<PathBuf>,
}

/// Decodes one ZDW stream into a data file and a desc file.
///
/// ```text
///   read_header ──► projection ──► desc file ──► rows ──► FileSink
///                                                    └──► OrderedFileSink (ordered)
///
///   desc_only:  read_header ──► projection ──► desc file (or stdout)
///   test_only:  read_header ──► projection ──► rows ──► discarded
/// ```
///
/// Rows written before a failure stay in the data file; the error is
/// still returned.
pub struct FileUnconverter {
    engine: DecodeEngine,
    config: OutputConfig,
    options: UnconvertOptions,
}

impl FileUnconverter {
    #[must_use]
    pub fn new(engine: DecodeEngine, config: OutputConfig, options: UnconvertOptions) -> Self {
        Self {
            engine,
            config,
            options,
        }
    }

    /// Open `path` for unconversion.
    ///
    /// # Errors
    ///
    /// [`DecodeError::FileOpen`] if the input cannot be opened.
    pub fn open(
        path: impl AsRef<Path>,
        config: OutputConfig,
        options: UnconvertOptions,
    ) -> Result<Self, DecodeError> {
        Ok(Self::new(DecodeEngine::open(path)?, config, options))
    }

    #[must_use]
    pub fn engine(&self) -> &DecodeEngine {
        &self.engine
    }

    /// Run the unconversion in the configured mode.
    ///
    /// # Errors
    ///
    /// Any engine error, or an output error converted to
    /// [`DecodeError::FileCreation`] / [`DecodeError::Output`].
    /// [`DecodeError::MissingLastBlock`] if the stream stops before its
    /// last block; rows decoded up to that point are still written.
    pub fn run(&mut self, selection: &ColumnSelection) -> Result<UnconvertSummary, DecodeError> {
        self.engine.read_header()?;
        if let Some(columns) = &selection.columns {
            self.engine.set_columns_to_output(columns, selection.rule)?;
        }

        let mut summary = UnconvertSummary {
            base_name: self.engine.base_name().to_string(),
            ..UnconvertSummary::default()
        };
        let mut complete = true;

        if self.options.desc_only {
            if self.config.to_stdout {
                let mut out = io::stdout().lock();
                desc::write_desc(&self.engine, &mut out, &self.config)?;
                out.flush().map_err(DecodeError::Output)?;
            } else {
                summary.desc_path = Some(desc::write_desc_file(&self.engine, &self.config)?);
            }
        } else if self.options.test_only {
            let mut sink = FileSink::new(io::sink());
            (summary.rows, complete) = self.drain(&mut sink)?;
        } else {
            if !self.config.to_stdout {
                summary.desc_path = Some(desc::write_desc_file(&self.engine, &self.config)?);
            }
            let sink = FileSink::for_config(&self.config, self.engine.base_name())?;
            summary.data_path = sink.path().map(Path::to_path_buf);
            if self.config.ordered {
                let mut sink = OrderedFileSink::new(sink);
                (summary.rows, complete) = self.drain(&mut sink)?;
                sink.finish()?;
            } else {
                let mut sink = sink;
                (summary.rows, complete) = self.drain(&mut sink)?;
                sink.finish()?;
            }
        }

        // rows decoded so far are already written
        if !complete {
            return Err(DecodeError::MissingLastBlock {
                blocks: self.engine.blocks_read(),
            });
        }

        summary.blocks = self.engine.blocks_read();
        if !self.options.quiet {
            info!(
                file = %summary.base_name,
                rows = summary.rows,
                blocks = summary.blocks,
                test_only = self.options.test_only,
                desc_only = self.options.desc_only,
                "unconverted"
            );
        }
        Ok(summary)
    }

    /// Decode every remaining row into `sink`. The flag is false when the
    /// stream ended without a last-block flag.
    fn drain<S: RowSink>(&mut self, sink: &mut S) -> Result<(u64, bool), DecodeError> {
        let mut rows = 0u64;
        while !self.engine.is_finished() {
            let BlockStatus::Block { rows: block_rows } = self.engine.parse_next_block()? else {
                return Ok((rows, false));
            };
            if self.options.show_status {
                info!(
                    file = %self.engine.base_name(),
                    block = self.engine.blocks_read(),
                    rows = block_rows,
                    "decoding block"
                );
            }
            for _ in 0..block_rows {
                self.engine.decode_row_into(sink)?;
            }
            rows += u64::from(block_rows);
        }
        Ok((rows, true))
    }
}
