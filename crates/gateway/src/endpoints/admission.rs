//! # POST /admission/check
//!
//! 申告サイズに対する入庫判定。容量超過でもHTTP 200で判定値を返す。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use onboard_types::{AdmissionCheckRequest, AdmissionDecision};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /admission/check — 入庫判定。
///
/// エラーになるのはインフラ障害（使用量計測不能）のみ。
pub async fn handle_admission_check(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<AdmissionCheckRequest>,
) -> Result<Json<AdmissionDecision>, GatewayError> {
    if body.declared_bytes == 0 {
        return Err(GatewayError::BadRequest(
            "申告サイズは1以上である必要があります".to_string(),
        ));
    }

    let decision = state.admission.check_admission(body.declared_bytes).await?;
    Ok(Json(decision))
}
