//! # GET /usage
//!
//! 運用者向けの使用量ビュー。会計係のキャッシュを経由するため、
//! 返る値はTTLの範囲で古いことがある。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use onboard_types::UsageReport;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// GET /usage — コンテナ使用量の参照。
///
/// killスイッチ無効時は計測に依存せず、used 0・スイッチ状態を返す。
pub async fn handle_usage(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<UsageReport>, GatewayError> {
    let max_container_bytes = state.config.max_container_bytes;

    if !state.config.quota_check_enabled {
        return Ok(Json(UsageReport {
            quota_check_enabled: false,
            used_bytes: 0,
            max_container_bytes,
            remaining_bytes: max_container_bytes,
        }));
    }

    let quota = state.quota.as_ref().ok_or_else(|| {
        GatewayError::Internal("使用量の会計係が構築されていません".to_string())
    })?;
    let used_bytes = quota.get_used_bytes(false).await?;

    Ok(Json(UsageReport {
        quota_check_enabled: true,
        used_bytes,
        max_container_bytes,
        remaining_bytes: max_container_bytes.saturating_sub(used_bytes),
    }))
}
