//! # Gateway エラー型
//!
//! インフラ障害（使用量計測・URL署名）のみをエラーとして伝播する。
//! 容量超過は`AdmissionDecision`の値であり、ここには現れない。

use axum::http::StatusCode;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 使用量計測エンドポイントに到達できず、フォールバック可能な
    /// スナップショットも存在しない。クライアントは一時的な障害として
    /// リトライすべきであり、容量超過として扱ってはならない。
    #[error("コンテナ使用量を取得できません: {0}")]
    MeteringUnavailable(String),
    /// 署名付きURLの生成に失敗。Gateway内部ではリトライしない。
    #[error("署名付きURLの生成に失敗: {0}")]
    UrlGeneration(String),
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            GatewayError::MeteringUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UrlGeneration(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// 起動時設定エラー。プロセス初期化を失敗させ、実行時には発生しない。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("環境変数 {0} が設定されていません")]
    Missing(&'static str),
    /// 環境変数の値が不正
    #[error("環境変数 {var} の値が不正です: {reason}")]
    Invalid {
        /// 対象の環境変数名
        var: &'static str,
        /// 不正の内容
        reason: String,
    },
}
