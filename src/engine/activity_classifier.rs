// ==========================================
// 生产执行日志 - 工序分类器
// ==========================================
// 职责: 工序名 → ActivityKind,全系统唯一的分类入口
// 红线: 纯函数,不访问数据库; 名单来自配置,加载后不可变
// ==========================================

use crate::config::{config_defaults, ActivityConfigReader, ConfigResult};
use crate::domain::types::ActivityKind;
use std::collections::HashSet;
use tracing::debug;

/// 工序名规范化: 去首尾空白、转小写、连续空白合并为单个空格
pub fn normalize_activity_name(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ==========================================
// ActivityClassifier
// ==========================================
#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    packaging: HashSet<String>,
    qa: String,
    transfer: String,
}

impl Default for ActivityClassifier {
    fn default() -> Self {
        Self::new(
            config_defaults::PACKAGING_ACTIVITIES.iter().copied(),
            config_defaults::QA_ACTIVITY,
            config_defaults::TRANSFER_ACTIVITY,
        )
    }
}

impl ActivityClassifier {
    /// 按给定名单构造 (名单内名称会被规范化)
    pub fn new<I, S>(packaging: I, qa: &str, transfer: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            packaging: packaging
                .into_iter()
                .map(|s| normalize_activity_name(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
            qa: normalize_activity_name(qa),
            transfer: normalize_activity_name(transfer),
        }
    }

    /// 从配置加载名单
    pub async fn load(config: &dyn ActivityConfigReader) -> ConfigResult<Self> {
        let packaging = config.get_packaging_activities().await?;
        let qa = config.get_qa_activity().await?;
        let transfer = config.get_transfer_activity().await?;

        debug!(
            packaging = packaging.len(),
            qa = %qa,
            transfer = %transfer,
            "工序分类名单已加载"
        );
        Ok(Self::new(packaging, &qa, &transfer))
    }

    /// 工序名分类 (大小写/空白不敏感,全函数)
    pub fn classify(&self, activity_name: &str) -> ActivityKind {
        let normalized = normalize_activity_name(activity_name);
        if normalized.is_empty() {
            return ActivityKind::Generic;
        }
        if normalized == self.qa {
            ActivityKind::QualityAssessment
        } else if self.packaging.contains(&normalized) {
            ActivityKind::PackagingOutput
        } else if normalized == self.transfer {
            ActivityKind::TransferToStore
        } else {
            ActivityKind::Generic
        }
    }

    /// 是否为包装产出类工序
    pub fn is_packaging(&self, activity_name: &str) -> bool {
        self.classify(activity_name) == ActivityKind::PackagingOutput
    }
}
