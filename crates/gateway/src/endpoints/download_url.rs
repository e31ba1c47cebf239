//! # POST /download-url
//!
//! 既存オブジェクトに対する署名付きGET URLの発行（キャッシュ利用）。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use onboard_types::{DownloadUrlRequest, DownloadUrlResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /download-url — 署名付きダウンロードURL発行。
///
/// 同一オブジェクトへの再要求はキャッシュから返る（安全マージン分の
/// 有効期間は常に保証される）。
pub async fn handle_download_url(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<DownloadUrlRequest>,
) -> Result<Json<DownloadUrlResponse>, GatewayError> {
    if body.object_key.is_empty() {
        return Err(GatewayError::BadRequest(
            "オブジェクトキーが空です".to_string(),
        ));
    }

    let issued = state
        .credentials
        .issue_download_url(&body.object_key, state.config.presign_expiry_secs, true)
        .await?;

    // expires_atは発行係が記録した署名の真の有効期限。ここで再計算しない
    Ok(Json(DownloadUrlResponse {
        download_url: issued.url,
        expires_at: issued.expires_at,
    }))
}
