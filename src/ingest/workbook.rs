//! 上传工作簿读取
//!
//! 使用 calamine 从内存读取 xlsx/xls/ods，转换为与格式无关的字符串表格。

use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};
use std::io::{Cursor, Read, Seek};
use tracing::debug;

use crate::error::{AppError, Result};

/// 工作表内容：首行为表头，其余为数据行
///
/// 空白行原样保留，`rows[i]` 对应表格中的第 `header_row + i + 1` 行。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub name: String,
    /// 表头所在的表格行号（从 1 开始）
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn new(name: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self {
            name: name.to_string(),
            header_row: 1,
            headers,
            rows,
        };
        table.align_row_lengths();
        table
    }

    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.header_row = header_row;
        self
    }

    /// 第 `idx` 个数据行在表格中的行号
    pub fn row_number(&self, idx: usize) -> usize {
        self.header_row + idx + 1
    }

    pub fn is_blank_row(row: &[String]) -> bool {
        row.iter().all(|value| value.is_empty())
    }

    /// 补齐行长度，保证每行与表头等宽
    fn align_row_lengths(&mut self) {
        let width = self
            .rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        self.headers.resize(width, String::new());
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }
}

/// 一次上传所需的两张工作表
#[derive(Debug, Clone)]
pub struct UploadWorkbook {
    pub answers: SheetTable,
    pub mapping: SheetTable,
}

/// 从上传的字节流读取作答表和版本映射表
pub fn read_upload(
    bytes: Vec<u8>,
    answer_sheet_index: usize,
    mapping_sheet_index: usize,
) -> Result<UploadWorkbook> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names().to_vec();
    debug!("Workbook sheets: {:?}", sheet_names);

    let answers = read_sheet(&mut workbook, &sheet_names, answer_sheet_index)?;
    let mapping = read_sheet(&mut workbook, &sheet_names, mapping_sheet_index)?;

    Ok(UploadWorkbook { answers, mapping })
}

fn read_sheet<RS>(
    workbook: &mut Sheets<RS>,
    sheet_names: &[String],
    index: usize,
) -> Result<SheetTable>
where
    RS: Read + Seek,
{
    let name = sheet_names.get(index).ok_or_else(|| {
        AppError::Spreadsheet(format!(
            "Workbook has {} sheet(s), sheet #{} is required",
            sheet_names.len(),
            index + 1
        ))
    })?;

    let range = workbook.worksheet_range(name)?;
    // calamine 的区域从第一个非空单元格开始
    let header_row = range.start().map_or(1, |(row, _)| row as usize + 1);
    let mut rows_iter = range.rows();

    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Ok(SheetTable::new(name, Vec::new(), Vec::new())),
    };

    let rows = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .collect();

    Ok(SheetTable::new(name, headers, rows).with_header_row(header_row))
}

/// 将单元格转换为字符串，整数值的浮点数不显示小数点
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// 将单元格文本解析为整数（兼容 "3" 与 "3.0"）
pub fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(i) = value.parse::<i64>() {
        return Some(i);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_string_renders_integral_floats() {
        assert_eq!(cell_to_string(&Data::Float(1.0)), "1");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(11)), "11");
        assert_eq!(cell_to_string(&Data::String(" A1 ".into())), "A1");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("3"), Some(3));
        assert_eq!(parse_integer("3.0"), Some(3));
        assert_eq!(parse_integer("3.5"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("x"), None);
    }

    #[test]
    fn test_sheet_table_aligns_rows() {
        let table = SheetTable::new(
            "answers",
            vec!["Q1".into()],
            vec![vec!["1".into(), "0".into()], vec![]],
        );
        assert_eq!(table.headers.len(), 2);
        assert!(table.rows.iter().all(|r| r.len() == 2));
        assert!(SheetTable::is_blank_row(&table.rows[1]));
        assert_eq!(table.row_number(1), 3);
        assert_eq!(table.with_header_row(4).row_number(0), 5);
    }

    #[test]
    fn test_read_upload_rejects_empty_bytes() {
        assert!(matches!(
            read_upload(Vec::new(), 0, 2),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_read_upload_rejects_garbage() {
        assert!(read_upload(b"not a workbook".to_vec(), 0, 2).is_err());
    }
}
