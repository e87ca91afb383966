use crate::error::ExtractError;
use crate::sidra::Table;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// Write a table to a single-sheet `.xlsx`: header in the first row, every
/// cell stored as text exactly as received.
pub fn write_table(path: &Path, table: &Table) -> Result<(), ExtractError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        let (row, col) = cell_position(0, col)?;
        sheet.write_string(row, col, header)?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                let (row, col) = cell_position(row_idx + 1, col)?;
                sheet.write_string(row, col, cell)?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn cell_position(row: usize, col: usize) -> Result<(u32, u16), ExtractError> {
    match (u32::try_from(row), u16::try_from(col)) {
        (Ok(r), Ok(c)) => Ok((r, c)),
        _ => Err(ExtractError::CellOutOfRange { row, col }),
    }
}

/// Read the first sheet of a workbook back into a table.
pub fn read_table(path: &Path) -> Result<Table, ExtractError> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ExtractError::NoSheets(path.to_path_buf()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row.iter().map(cell_text).collect(),
        None => return Ok(Table::default()),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Ok(Table { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_keeps_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PPM_TEST_2020.xlsx");
        let table = Table {
            headers: vec!["Valor".to_string(), "Município".to_string()],
            rows: vec![
                vec!["1520".to_string(), "Ariquemes - RO".to_string()],
                vec!["-".to_string(), "Cabixi - RO".to_string()],
            ],
        };

        write_table(&path, &table).unwrap();
        let read = read_table(&path).unwrap();

        assert_eq!(read, table);
    }

    #[test]
    fn test_empty_cells_read_back_as_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.xlsx");
        let table = Table {
            headers: vec!["Unidade de Medida".to_string(), "Valor".to_string()],
            rows: vec![vec![String::new(), "12".to_string()]],
        };

        write_table(&path, &table).unwrap();
        let read = read_table(&path).unwrap();

        assert_eq!(read.rows, vec![vec![String::new(), "12".to_string()]]);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_table(&dir.path().join("absent.xlsx")).is_err());
    }

    #[test]
    fn test_cell_position_rejects_oversized_index() {
        assert_eq!(cell_position(3, 12).unwrap(), (3, 12));
        assert!(matches!(
            cell_position(1, 70_000),
            Err(ExtractError::CellOutOfRange { row: 1, col: 70_000 })
        ));
        assert!(matches!(
            cell_position(u32::MAX as usize + 1, 0),
            Err(ExtractError::CellOutOfRange { col: 0, .. })
        ));
    }
}
