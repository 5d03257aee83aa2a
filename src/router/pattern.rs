//! 通配符模式匹配
//!
//! 调度器与配置核心共用的匹配契约：
//! - `*` 匹配零个或多个任意字符（包括 `/`）
//! - 其他字符（包括 `?`、`[`、`]`）一律按字面匹配
//! - 区分大小写，不做路径分段处理
//!
//! 例如 `/api/*` 可以匹配 `/api/anthropic/v1/messages`。

/// 检查 `value` 是否匹配 `pattern`
///
/// 按字节比较；字面片段本身是合法 UTF-8，因此只会在字符边界上命中。
pub fn matches(pattern: &str, value: &str) -> bool {
    let pattern = pattern.as_bytes();
    let value = value.as_bytes();

    let mut p = 0;
    let mut v = 0;
    // 最近一个 `*` 的位置，以及它当前吞掉的内容的结束位置
    let mut star: Option<usize> = None;
    let mut star_end = 0;

    while v < value.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            star_end = v;
            p += 1;
        } else if p < pattern.len() && pattern[p] == value[v] {
            p += 1;
            v += 1;
        } else if let Some(star_pos) = star {
            // 回溯：让上一个 `*` 多吞一个字节
            star_end += 1;
            v = star_end;
            p = star_pos + 1;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}
