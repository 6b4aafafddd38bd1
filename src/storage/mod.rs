//! 存储层模块
//!
//! 题目、试卷与作答记录的仓储接口及内存实现。

pub mod memory;
pub mod repository;
