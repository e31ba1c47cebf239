//! # Onboard Storage Gateway
//!
//! サイズ上限付きオブジェクトストレージコンテナへの入庫ゲートウェイ。
//!
//! ## 役割
//! - 入庫判定: 申告サイズ + 使用量スナップショットによる受け入れ可否の決定
//! - 使用量のTTLキャッシュ: 高コストな計測エンドポイントへの問い合わせを抑制
//! - 署名付きURL発行: クライアントがストレージと直接転送するための時限付き認証情報
//! - キャッシュ掃除: ダウンロードURLキャッシュの失効エントリを定期削除
//!
//! ## API エンドポイント
//! - `POST /admission/check` — 入庫判定
//! - `POST /upload-url` — 入庫判定 + 署名付きアップロードURL発行
//! - `POST /download-url` — 署名付きダウンロードURL発行（キャッシュ利用）
//! - `POST /upload-completed` — アップロード完了通知（使用量キャッシュ破棄）
//! - `GET /usage` — 使用量の参照

mod admission;
mod config;
mod credentials;
mod endpoints;
mod error;
mod janitor;
mod quota;
mod storage;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};

use crate::admission::AdmissionController;
use crate::config::{GatewayConfig, GatewayState};
use crate::credentials::CredentialIssuer;
use crate::endpoints::{
    handle_admission_check, handle_download_url, handle_upload_completed, handle_upload_url,
    handle_usage,
};
use crate::janitor::CacheJanitor;
use crate::quota::QuotaAccountant;
use crate::storage::{HttpUsageMeter, ObjectSigner, S3ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let listen_addr = config.listen_addr.clone();

    // オブジェクトストア（S3互換）
    let signer: Arc<dyn ObjectSigner> = Arc::new(S3ObjectStore::from_env()?);

    // 使用量の会計係。killスイッチ無効時は計測エンドポイントに依存しない。
    let quota = match (&config.metering_endpoint, config.quota_check_enabled) {
        (Some(endpoint), true) => {
            let meter = HttpUsageMeter::new(
                endpoint.clone(),
                Duration::from_secs(config.metering_timeout_secs),
            )?;
            Some(Arc::new(QuotaAccountant::new(
                Arc::new(meter),
                config.quota_cache_ttl(),
            )))
        }
        _ => {
            tracing::warn!("容量チェックは無効です。すべてのアップロードが許可されます");
            None
        }
    };

    let admission = AdmissionController::new(
        quota.clone(),
        config.max_container_bytes,
        config.quota_check_enabled,
    );
    let credentials = Arc::new(CredentialIssuer::new(
        signer,
        config.credential_cache_margin(),
    ));

    let janitor = CacheJanitor::spawn(credentials.clone(), config.janitor_interval());

    tracing::info!(
        max_container_bytes = config.max_container_bytes,
        quota_cache_ttl_secs = config.quota_cache_ttl_secs,
        quota_check_enabled = config.quota_check_enabled,
        "Gateway設定を読み込みました"
    );

    let state = Arc::new(GatewayState {
        config,
        quota,
        admission,
        credentials,
    });

    let app = axum::Router::new()
        .route("/admission/check", post(handle_admission_check))
        .route("/upload-url", post(handle_upload_url))
        .route("/download-url", post(handle_download_url))
        .route("/upload-completed", post(handle_upload_completed))
        .route("/usage", get(handle_usage))
        .with_state(state);

    tracing::info!("Gatewayを {} で起動します", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("シャットダウンシグナルを受信しました");
        })
        .await?;

    // サーバー停止後にバックグラウンドタスクを確実に止める
    janitor.shutdown().await;

    Ok(())
}
