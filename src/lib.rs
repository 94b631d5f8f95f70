//! Scout - 自适应 RAG 检索子代理
//!
//! 模块划分：
//! - **agent**: 检索子代理（工具决策、工具操作、清洗、验证、主循环）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、嵌入客户端
//! - **memory**: 按 query_id 隔离的跨步会话存储
//! - **pipeline**: 外层流水线（事实抽取、计划、答案合成）
//! - **rerank**: 相关性打分服务客户端
//! - **search**: 搜索引擎查询、页面抓取、分块、反爬识别

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod rerank;
pub mod search;
