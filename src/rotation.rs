//! 密钥生命周期：轮换策略与每次使用前的同步守卫。
//!
//! 这里没有后台任务；`KeyLifecycle::admit` 在每次取用密钥时被调用，
//! 轮换本身由调用方显式触发。

use crate::common::errors::{CryptoError, Result};
use crate::keys::record::{DEPRECATED, KeyInfo, REPLACED_BY};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 密钥轮换策略，定义了密钥的生命周期和使用限制。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationPolicy {
    /// 轮换后旧密钥继续可用的天数
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,
    /// 未显式指定 TTL 时新密钥的有效天数；`None` 表示不过期
    #[serde(default)]
    pub default_ttl_days: Option<u32>,
    /// 未显式指定时新密钥的最大使用次数
    #[serde(default)]
    pub max_usage_count: Option<u64>,
    /// 在密钥过期前多少天就应该提示轮换
    #[serde(default = "default_rotation_start_days")]
    pub rotation_start_days: u32,
}

fn default_grace_period_days() -> u32 {
    7
}

fn default_rotation_start_days() -> u32 {
    7
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            grace_period_days: default_grace_period_days(),
            default_ttl_days: None,
            max_usage_count: None,
            rotation_start_days: default_rotation_start_days(),
        }
    }
}

impl RotationPolicy {
    pub fn grace_period(&self) -> Duration {
        Duration::days(self.grace_period_days as i64)
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_days.map(|days| Duration::days(days as i64))
    }
}

/// 每次使用密钥前执行的守卫
pub struct KeyLifecycle<'a> {
    policy: &'a RotationPolicy,
    now: DateTime<Utc>,
}

impl<'a> KeyLifecycle<'a> {
    pub fn new(policy: &'a RotationPolicy) -> Self {
        Self::at(policy, Utc::now())
    }

    /// 以给定时间点执行检查
    pub fn at(policy: &'a RotationPolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now }
    }

    /// 检查过期与使用上限，不修改密钥
    pub fn check(&self, info: &KeyInfo) -> Result<()> {
        if info.is_expired_at(self.now) {
            return Err(CryptoError::KeyExpired {
                key_id: info.key_id.clone(),
            });
        }
        if let Some(max_usage) = info.max_usage {
            if info.usage_count >= max_usage {
                return Err(CryptoError::KeyUsageExceeded {
                    key_id: info.key_id.clone(),
                    max_usage,
                });
            }
        }
        Ok(())
    }

    /// 准入一次使用：检查通过后计数加一。已弃用的密钥只告警。
    pub fn admit(&self, info: &mut KeyInfo) -> Result<()> {
        self.check(info)?;
        if info.is_deprecated() {
            warn!(
                key_id = %info.key_id,
                replaced_by = info.replaced_by().unwrap_or("-"),
                "using deprecated key"
            );
        }
        info.usage_count += 1;
        Ok(())
    }

    /// 把密钥标记为已被 `new_key_id` 取代，并把过期时间收紧到宽限期结束
    pub fn retire(&self, info: &mut KeyInfo, new_key_id: &str, grace: Duration) {
        info.metadata.insert(DEPRECATED.to_string(), true.into());
        info.metadata
            .insert(REPLACED_BY.to_string(), new_key_id.to_string().into());
        let grace_end = self.now + grace;
        info.expires_at = Some(match info.expires_at {
            Some(existing) if existing < grace_end => existing,
            _ => grace_end,
        });
    }

    /// 密钥是否已接近过期或接近使用上限
    pub fn needs_rotation(&self, info: &KeyInfo) -> bool {
        if info.is_deprecated() {
            return false;
        }
        if let Some(expires_at) = info.expires_at {
            let warning = Duration::days(self.policy.rotation_start_days as i64);
            if self.now + warning >= expires_at {
                return true;
            }
        }
        if let Some(max_usage) = info.max_usage {
            // 剩余不足一成时提示轮换
            if info.usage_count.saturating_mul(10) >= max_usage.saturating_mul(9) {
                return true;
            }
        }
        false
    }
}
