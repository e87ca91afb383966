use crate::error::PipelineError;
use crate::transform::RawTable;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::info;

/// Read the first sheet of the consolidated workbook. The first row is the header.
pub fn read_consolidated(path: &Path) -> Result<RawTable, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }

    let workbook_err = |source: calamine::Error| PipelineError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::NoSheets(path.to_path_buf()))?;
    let range = workbook.worksheet_range(&sheet_name).map_err(workbook_err)?;

    let (row_count, col_count) = range.get_size();
    info!(
        file = %path.display(),
        sheet = %sheet_name,
        rows = row_count,
        columns = col_count,
        "reading consolidated file"
    );

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default().trim().to_string())
            .collect(),
        None => return Ok(RawTable::default()),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
