//! # POST /upload-url
//!
//! 入庫判定を通過したアップロードに対する署名付きPUT URLの発行。

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::Json;
use onboard_types::{UploadUrlOutcome, UploadUrlRequest};

use crate::admission::generate_object_key;
use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /upload-url — 署名付きアップロードURL発行。
///
/// サイズ検証 → 入庫判定 → オブジェクトキー生成 → PUT URL署名の順に進む。
/// 容量超過はHTTP 200の`rejected`として返し、クライアントが現在量と上限を
/// ユーザーに表示できるようにする。
pub async fn handle_upload_url(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<UploadUrlRequest>,
) -> Result<Json<UploadUrlOutcome>, GatewayError> {
    // EDoS対策: 単一アップロードの上限チェック
    if body.content_size > state.config.max_upload_bytes {
        return Err(GatewayError::BadRequest(format!(
            "コンテンツサイズが上限を超えています: {} bytes (上限: {} bytes)",
            body.content_size, state.config.max_upload_bytes
        )));
    }

    if body.content_size == 0 {
        return Err(GatewayError::BadRequest(
            "コンテンツサイズは1以上である必要があります".to_string(),
        ));
    }

    let decision = state.admission.check_admission(body.content_size).await?;
    if !decision.allowed {
        tracing::info!(
            declared_bytes = body.content_size,
            current_used_bytes = decision.current_used_bytes,
            max_allowed_bytes = decision.max_allowed_bytes,
            "容量超過によりアップロードを拒否しました"
        );
        return Ok(Json(UploadUrlOutcome::Rejected { decision }));
    }

    // 同名ファイルの並行アップロードでも衝突しないキーを生成
    let object_key = generate_object_key(&body.scope, &body.category, &body.file_name);

    let upload_url = state
        .credentials
        .issue_upload_url(&object_key, &body.content_type, state.config.presign_expiry_secs)
        .await?;

    // URL有効期限のUNIXタイムスタンプ
    let expires_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| GatewayError::Internal(format!("時刻取得失敗: {e}")))?
        .as_secs()
        + u64::from(state.config.presign_expiry_secs);

    Ok(Json(UploadUrlOutcome::Admitted {
        upload_url,
        object_key,
        expires_at,
    }))
}
