//! Provider 变更同步
//!
//! Provider 注册表在删除 Provider 时发送明确的“待移除规则”列表，本模块据此对账：
//! - 普通规则直接删除
//! - 默认规则改指向剩余的第一个 Provider；没有剩余 Provider 时删除，等待下次补齐
//!
//! 新增 Provider 时重试默认规则补齐。

use crate::models::{
    ProviderDeletionPolicy, ProviderEvent, ProviderRemoval, ReconcileReport, RoutingRule,
};
use crate::services::error::RouterError;
use crate::services::RouterService;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

impl RouterService {
    /// 按策略生成 Provider 删除指令
    ///
    /// - `Cascade`：列出所有引用该 Provider 的规则
    /// - `Flag`：不列出任何规则，规则保留为悬空状态
    pub fn plan_provider_removal(
        &self,
        provider_id: &str,
        policy: ProviderDeletionPolicy,
    ) -> ProviderRemoval {
        let rules_to_drop = match policy {
            ProviderDeletionPolicy::Cascade => self
                .snapshot()
                .into_iter()
                .filter(|r| r.provider_id == provider_id)
                .map(|r| r.id)
                .collect(),
            ProviderDeletionPolicy::Flag => Vec::new(),
        };
        ProviderRemoval {
            provider_id: provider_id.to_string(),
            rules_to_drop,
        }
    }

    /// 执行 Provider 删除指令
    ///
    /// 指令中不存在的规则 id 会被忽略。单步写入失败时，已完成的步骤保留在缓存中。
    pub fn apply_provider_removal(
        &self,
        removal: &ProviderRemoval,
    ) -> Result<ReconcileReport, RouterError> {
        let _guard = self.lock_writes();
        let snapshot = self.snapshot();
        let providers = self.list_providers()?;
        let fallback = providers.iter().find(|p| p.id != removal.provider_id);

        let mut report = ReconcileReport::default();
        let mut handled: HashSet<&str> = HashSet::new();

        for id in &removal.rules_to_drop {
            if !handled.insert(id.as_str()) {
                continue;
            }
            let Some(rule) = snapshot.iter().find(|r| r.id == *id) else {
                tracing::debug!(rule_id = %id, "[路由规则] 待移除规则不存在，跳过");
                continue;
            };

            match fallback {
                Some(provider) if rule.is_locked() => {
                    let mut rule = rule.clone();
                    rule.provider_id = provider.id.clone();
                    rule.updated_at = Utc::now();
                    self.persist_update(&rule)?;
                    tracing::info!(
                        rule_id = %rule.id,
                        provider_id = %provider.id,
                        "[路由规则] 默认规则已改指向其他 Provider"
                    );
                    report.reassigned.push(rule.id);
                }
                _ => {
                    self.persist_delete(id)?;
                    tracing::info!(
                        rule_id = %id,
                        provider_id = %removal.provider_id,
                        "[路由规则] 已移除引用已删除 Provider 的规则"
                    );
                    report.dropped.push(id.clone());
                }
            }
        }

        report.dangling = self
            .snapshot()
            .into_iter()
            .filter(|r| {
                r.provider_id == removal.provider_id
                    || !providers.iter().any(|p| p.id == r.provider_id)
            })
            .map(|r| r.id)
            .collect();
        if !report.dangling.is_empty() {
            tracing::warn!(
                provider_id = %removal.provider_id,
                "[路由规则] {} 条规则引用了不存在的 Provider",
                report.dangling.len()
            );
        }

        Ok(report)
    }

    /// 按服务配置的删除策略对账
    pub fn reconcile_provider_deletion(
        &self,
        provider_id: &str,
    ) -> Result<ReconcileReport, RouterError> {
        let removal = self.plan_provider_removal(provider_id, self.deletion_policy());
        self.apply_provider_removal(&removal)
    }

    /// 引用了注册表中不存在的 Provider 的规则
    pub fn dangling_rules(&self) -> Result<Vec<RoutingRule>, RouterError> {
        let providers = self.list_providers()?;
        Ok(self
            .list(None)
            .into_iter()
            .filter(|r| !providers.iter().any(|p| p.id == r.provider_id))
            .collect())
    }

    /// 处理单个 Provider 事件
    pub fn handle_provider_event(&self, event: &ProviderEvent) -> Result<(), RouterError> {
        match event {
            ProviderEvent::Added { provider_id } => {
                tracing::debug!(provider_id = %provider_id, "[路由规则] 收到新增 Provider 事件");
                match self.bootstrap() {
                    Ok(_) => Ok(()),
                    Err(RouterError::NoProviderAvailable) => {
                        tracing::warn!("[路由规则] 注册表中仍没有可用 Provider");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            ProviderEvent::Deleted(removal) => self.apply_provider_removal(removal).map(|_| ()),
        }
    }
}

/// 监听 Provider 事件直到通道关闭
///
/// 事件积压丢失时从存储重新加载规则。处理事件会访问 SQLite，在阻塞线程池中执行。
pub async fn watch_provider_events(
    service: Arc<RouterService>,
    mut rx: broadcast::Receiver<ProviderEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let service = service.clone();
                let result =
                    tokio::task::spawn_blocking(move || service.handle_provider_event(&event))
                        .await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("[路由规则] 处理 Provider 事件失败: {}", e),
                    Err(e) => tracing::error!("[路由规则] Provider 事件任务异常退出: {}", e),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("[路由规则] 丢失 {} 个 Provider 事件，重新加载规则", skipped);
                let service = service.clone();
                match tokio::task::spawn_blocking(move || service.reload()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("[路由规则] 重新加载失败: {}", e),
                    Err(e) => tracing::error!("[路由规则] 重新加载任务异常退出: {}", e),
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("[路由规则] Provider 事件通道已关闭");
                break;
            }
        }
    }
}
