//! # ストレージ抽象
//!
//! Gatewayが外部コラボレーターに要求するインターフェース。
//! オブジェクトストアのURL署名と使用量計測をトレイトで抽象化し、
//! S3互換実装は`s3`サブモジュール、計測実装は`metering`サブモジュールを参照。
//! 実際のバイト転送はクライアントが署名付きURLに対して直接行い、
//! Gatewayは転送に関与しない。

pub mod metering;
pub mod s3;

pub use metering::HttpUsageMeter;
pub use s3::S3ObjectStore;

use onboard_types::UsageTotals;

use crate::error::GatewayError;

/// オブジェクトストアのURL署名インターフェース。
///
/// Gateway運用者はS3互換ストレージ（MinIO, AWS S3, Cloudflare R2等）や
/// その他のバックエンドを実装として選択できる。
#[async_trait::async_trait]
pub trait ObjectSigner: Send + Sync {
    /// 署名付きアップロードURL（PUT）を生成する。
    ///
    /// `content_type`はアップロード対象の申告値。署名に含めるかどうかは
    /// 実装依存であり、含めない実装ではクライアントのContent-Typeを
    /// 強制しない（S3実装は含めない。`s3`モジュール参照）。
    async fn presign_put(
        &self,
        object_key: &str,
        content_type: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError>;

    /// 署名付きダウンロードURL（GET）を生成する。
    async fn presign_get(
        &self,
        object_key: &str,
        expiry_secs: u32,
    ) -> Result<String, GatewayError>;
}

/// コンテナ使用量の計測インターフェース。
///
/// 遅い・レート制限される・一時的に利用不能になる可能性がある。
/// 呼び出し側（QuotaAccountant）がTTLキャッシュと
/// stale-readフォールバックで吸収する。
#[async_trait::async_trait]
pub trait UsageMeter: Send + Sync {
    /// コンテナの現在の集計使用量を取得する。
    async fn fetch_usage(&self) -> Result<UsageTotals, GatewayError>;
}
