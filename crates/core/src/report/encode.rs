//! CSV encoding of report rows.

use super::error::WriteError;
use super::row::{ViolationRow, HEADERS};

/// Serializes rows to CSV bytes, numbering them from 1 in slice order.
pub fn encode_csv(rows: &[ViolationRow]) -> Result<Vec<u8>, WriteError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for (index, row) in rows.iter().enumerate() {
        writer.write_record(row.to_record(index + 1))?;
    }

    writer
        .into_inner()
        .map_err(|e| WriteError::Encode(csv::Error::from(e.into_error())))
}
