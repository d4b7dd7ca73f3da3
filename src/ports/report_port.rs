//! Signal table export port trait.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::error::SignalError;
use crate::domain::record::SignalRecord;

/// Port for exporting records as they are produced.
pub trait ReportPort {
    /// Drain `records` into `out`, returning the number of rows written.
    fn write(
        &self,
        records: &mut dyn Iterator<Item = SignalRecord>,
        out: &mut dyn Write,
    ) -> Result<usize, SignalError>;

    /// Default implementation: buffers `write` into a newly created file.
    fn write_file(
        &self,
        records: &mut dyn Iterator<Item = SignalRecord>,
        output_path: &Path,
    ) -> Result<usize, SignalError> {
        let mut file = BufWriter::new(File::create(output_path)?);
        let rows = self.write(records, &mut file)?;
        file.flush()?;
        Ok(rows)
    }
}
