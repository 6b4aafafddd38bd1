//! MCQ Analytics - 选择题题库分析服务
//!
//! 对上传的作答数据做 IRT 标定并给出题目质量分，
//! 同时基于文本嵌入检索相似题、比较两份试卷。

pub mod api;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod irt;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
