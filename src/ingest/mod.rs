//! 上传数据解析模块
//!
//! 工作簿读取、试卷版本映射与作答矩阵构建。

pub mod matrix_builder;
pub mod version_mapping;
pub mod workbook;

pub use matrix_builder::{
    BuiltMatrix, ResolvedResponse, ResponseMatrixBuilder, StudentRow, resolve_student,
};
pub use version_mapping::{VersionMapping, parse_version_mappings, validate_mappings};
pub use workbook::{SheetTable, UploadWorkbook, read_upload};
