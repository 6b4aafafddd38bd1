//! 标定 DTO

use serde::Deserialize;

/// 上传查询参数
#[derive(Debug, Deserialize, Default)]
pub struct UploadQueryParams {
    /// "2PL" 或 "3PL"，缺省使用配置
    pub model: Option<String>,
}
