//! # 使用量計測クライアント
//!
//! 使用量計測エンドポイントにHTTPで問い合わせる`UsageMeter`実装。
//! バイト数は精度劣化を避けるため文字列エンコードで受信し、u64としてパースする。

use std::time::Duration;

use onboard_types::UsageTotals;
use serde::Deserialize;

use super::UsageMeter;
use crate::error::GatewayError;

/// 使用量計測エンドポイントのレスポンス。
///
/// バイト数フィールドは文字列エンコードされた整数
/// （JSONの数値型では大容量コンテナで精度が失われるため）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageWireReport {
    /// オブジェクト本体の合計バイト数（文字列エンコード）
    payload_bytes: String,
    /// メタデータの合計バイト数（文字列エンコード）
    metadata_bytes: String,
    /// オブジェクト数
    object_count: u64,
}

/// HTTP経由の使用量計測クライアント。
pub struct HttpUsageMeter {
    /// 計測エンドポイントのURL
    endpoint: String,
    /// HTTPクライアント（タイムアウト設定済み）
    http_client: reqwest::Client,
}

impl HttpUsageMeter {
    /// 計測エンドポイントURLとタイムアウトからクライアントを構築する。
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("HTTPクライアントの構築に失敗: {e}")))?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// 文字列エンコードされたバイト数をパースする。
    fn parse_bytes(field: &str, raw: &str) -> Result<u64, GatewayError> {
        raw.parse::<u64>().map_err(|e| {
            GatewayError::MeteringUnavailable(format!(
                "計測レスポンスの{field}が整数として解釈できません ({raw}): {e}"
            ))
        })
    }
}

#[async_trait::async_trait]
impl UsageMeter for HttpUsageMeter {
    async fn fetch_usage(&self) -> Result<UsageTotals, GatewayError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| GatewayError::MeteringUnavailable(format!("HTTP送信失敗: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::MeteringUnavailable(format!("レスポンス読み取り失敗: {e}")))?;

        if !status.is_success() {
            return Err(GatewayError::MeteringUnavailable(format!(
                "計測エンドポイントがエラーを返しました: HTTP {status} - {body}"
            )));
        }

        let wire: UsageWireReport = serde_json::from_str(&body).map_err(|e| {
            GatewayError::MeteringUnavailable(format!("レスポンスのパースに失敗: {e}"))
        })?;

        Ok(UsageTotals {
            payload_bytes: Self::parse_bytes("payloadBytes", &wire.payload_bytes)?,
            metadata_bytes: Self::parse_bytes("metadataBytes", &wire.metadata_bytes)?,
            object_count: wire.object_count,
        })
    }
}
