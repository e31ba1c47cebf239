//! # POST /upload-completed
//!
//! アップロード完了通知の受領。使用量スナップショットを破棄し、
//! 次の入庫判定が直前に追加されたバイト数を見落とさないようにする。

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use onboard_types::UploadCompletedRequest;

use crate::config::GatewayState;

/// POST /upload-completed — アップロード完了通知。
///
/// クライアントはオブジェクト書き込みの成功確認後にのみ呼ぶこと。
/// キャッシュ値の加算ではなくスナップショット破棄で反映する。
pub async fn handle_upload_completed(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<UploadCompletedRequest>,
) -> StatusCode {
    tracing::info!(
        object_key = %body.object_key,
        "アップロード完了を受領。使用量スナップショットを破棄します"
    );
    state.admission.notify_upload_completed().await;
    StatusCode::NO_CONTENT
}
