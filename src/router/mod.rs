//! 路由系统模块
//!
//! 定义调度器必须遵守的匹配契约以及物化后的路由表。
//!
//! 匹配契约：
//! - `*` 匹配任意字符序列，其余字符按字面匹配，区分大小写
//! - 同一分区 `(api_group, rule_type)` 内按 priority 升序取第一个命中的规则
//! - 受保护的兜底规则在分区内最后参与匹配

mod pattern;
mod rules;

pub use pattern::matches;
pub use rules::{RouteResult, RouteTable};

#[cfg(test)]
mod tests;
