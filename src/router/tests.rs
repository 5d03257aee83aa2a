//! 路由模块属性测试
//!
//! 使用 proptest 进行属性测试

use crate::models::{ApiGroup, RoutingRule, RuleType};
use crate::router::{matches, RouteTable};
use proptest::prelude::*;

/// 生成不含通配符的字面片段
fn arb_literal() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9./_?\\[\\]-]{0,12}".prop_map(|s| s)
}

/// 生成随机的模型名称
fn arb_model_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]+-[a-z0-9-]+".prop_map(|s| s),
        "[a-z]+-[0-9]+\\.[0-9]+(-[a-z]+)?".prop_map(|s| s),
    ]
}

proptest! {
    /// *对于任意* 不含 `*` 的模式，只匹配与自身完全相同的值
    #[test]
    fn prop_literal_matches_only_itself(
        pattern in arb_literal(),
        value in arb_literal()
    ) {
        prop_assert!(matches(&pattern, &pattern));
        prop_assert_eq!(matches(&pattern, &value), pattern == value);
    }

    /// *对于任意* 值，单独的 `*` 都能匹配
    #[test]
    fn prop_star_matches_any(value in ".*") {
        prop_assert!(matches("*", &value));
    }

    /// *对于任意* 前缀和后缀，`prefix*` 匹配 `prefix + suffix`
    #[test]
    fn prop_prefix_wildcard(
        prefix in arb_literal(),
        suffix in arb_literal()
    ) {
        let pattern = format!("{prefix}*");
        let value = format!("{prefix}{suffix}");
        prop_assert!(matches(&pattern, &value));
    }

    /// *对于任意* 值，把其中任意一段替换为 `*` 后得到的模式仍然匹配原值
    #[test]
    fn prop_replacing_segment_with_star_still_matches(
        head in arb_literal(),
        middle in arb_literal(),
        tail in arb_literal()
    ) {
        let value = format!("{head}{middle}{tail}");
        let pattern = format!("{head}*{tail}");
        prop_assert!(matches(&pattern, &value));
    }

    /// *对于任意* 模型名，大小写不同时字面模式不匹配
    #[test]
    fn prop_case_sensitive(model in arb_model_name()) {
        let upper = model.to_uppercase();
        prop_assume!(upper != model);
        prop_assert!(!matches(&model, &upper));
    }

    /// *对于任意* 同分区内优先级互不相同的规则集合，路由命中的是
    /// 所有命中规则中 priority 最小的那一条
    #[test]
    fn prop_route_picks_lowest_priority(
        priorities in prop::collection::hash_set(1i32..1000, 1..10),
        model in arb_model_name()
    ) {
        let rules: Vec<RoutingRule> = priorities
            .iter()
            .map(|p| {
                RoutingRule::new(
                    format!("provider-{p}"),
                    "*".to_string(),
                    *p,
                    RuleType::Model,
                    ApiGroup::OpenAI,
                )
            })
            .collect();
        let table = RouteTable::from_rules(&rules);

        let result = table
            .route(ApiGroup::OpenAI, "/api/openai/v1/chat/completions", Some(&model))
            .unwrap();
        let min = priorities.iter().min().unwrap();
        prop_assert_eq!(result.provider_id, format!("provider-{min}"));
    }
}
