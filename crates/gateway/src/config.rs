//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//! 設定はプロセス起動時に一度だけ読み込まれ、以後不変。

use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionController;
use crate::credentials::CredentialIssuer;
use crate::error::ConfigError;
use crate::quota::QuotaAccountant;

/// 署名付きURLのデフォルト有効期限（秒）
const DEFAULT_PRESIGN_EXPIRY_SECS: u32 = 3600;
/// 使用量スナップショットのデフォルトTTL（秒）
const DEFAULT_QUOTA_CACHE_TTL_SECS: u64 = 900;
/// 認証情報キャッシュのデフォルト安全マージン（秒）
const DEFAULT_CREDENTIAL_MARGIN_SECS: u64 = 60;
/// キャッシュ掃除タスクのデフォルト実行間隔（秒）
const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 300;
/// 使用量計測リクエストのデフォルトタイムアウト（秒）
const DEFAULT_METERING_TIMEOUT_SECS: u64 = 10;
/// 単一アップロードのデフォルト上限（2GB）
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Gateway設定。起動時に環境変数から構築され、以後不変。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// コンテナの最大許容量（バイト）。必須、正の値。
    pub max_container_bytes: u64,
    /// 使用量スナップショットのTTL（秒）
    pub quota_cache_ttl_secs: u64,
    /// 認証情報キャッシュの安全マージン（秒）。
    /// キャッシュ上の有効期限は署名の真の有効期限よりこの分だけ早い。
    pub credential_cache_margin_secs: u64,
    /// 容量チェックのkillスイッチ。無効時は計測エンドポイントに依存せず常に許可。
    pub quota_check_enabled: bool,
    /// 署名付きURLの有効期限（秒）
    pub presign_expiry_secs: u32,
    /// 単一アップロードの上限サイズ（バイト）
    pub max_upload_bytes: u64,
    /// キャッシュ掃除タスクの実行間隔（秒）
    pub janitor_interval_secs: u64,
    /// 使用量計測エンドポイントのURL。容量チェック有効時は必須。
    pub metering_endpoint: Option<String>,
    /// 使用量計測リクエストのタイムアウト（秒）
    pub metering_timeout_secs: u64,
    /// HTTPサーバーの待ち受けアドレス
    pub listen_addr: String,
}

impl GatewayConfig {
    /// 環境変数から設定を構築する。
    ///
    /// 必須項目の欠落や不正な値は`ConfigError`となり、プロセス起動を失敗させる。
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_container_bytes = require_u64("MAX_CONTAINER_BYTES")?;
        if max_container_bytes == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONTAINER_BYTES",
                reason: "正の値である必要があります".to_string(),
            });
        }

        let quota_check_enabled = optional_bool("QUOTA_CHECK_ENABLED", true)?;

        let metering_endpoint = std::env::var("METERING_ENDPOINT").ok();
        if quota_check_enabled && metering_endpoint.is_none() {
            return Err(ConfigError::Missing("METERING_ENDPOINT"));
        }

        Ok(Self {
            max_container_bytes,
            quota_cache_ttl_secs: optional_u64(
                "QUOTA_CACHE_TTL_SECS",
                DEFAULT_QUOTA_CACHE_TTL_SECS,
            )?,
            credential_cache_margin_secs: optional_u64(
                "CREDENTIAL_CACHE_MARGIN_SECS",
                DEFAULT_CREDENTIAL_MARGIN_SECS,
            )?,
            quota_check_enabled,
            presign_expiry_secs: to_u32(
                "PRESIGN_EXPIRY_SECS",
                optional_u64("PRESIGN_EXPIRY_SECS", u64::from(DEFAULT_PRESIGN_EXPIRY_SECS))?,
            )?,
            max_upload_bytes: optional_u64("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            janitor_interval_secs: optional_u64(
                "JANITOR_INTERVAL_SECS",
                DEFAULT_JANITOR_INTERVAL_SECS,
            )?,
            metering_endpoint,
            metering_timeout_secs: optional_u64(
                "METERING_TIMEOUT_SECS",
                DEFAULT_METERING_TIMEOUT_SECS,
            )?,
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }

    /// 使用量スナップショットのTTL。
    #[must_use]
    pub fn quota_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.quota_cache_ttl_secs)
    }

    /// 認証情報キャッシュの安全マージン。
    #[must_use]
    pub fn credential_cache_margin(&self) -> Duration {
        Duration::from_secs(self.credential_cache_margin_secs)
    }

    /// キャッシュ掃除タスクの実行間隔。
    #[must_use]
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

/// Gatewayの共有状態。リクエストハンドラ間で`Arc`共有される。
pub struct GatewayState {
    /// 不変の設定
    pub config: GatewayConfig,
    /// 使用量の会計係。killスイッチ無効時は構築されない。
    pub quota: Option<Arc<QuotaAccountant>>,
    /// 入庫判定のオーケストレーター
    pub admission: AdmissionController,
    /// 署名付きURLの発行係（ダウンロードURLキャッシュを含む）
    pub credentials: Arc<CredentialIssuer>,
}

/// 必須のu64環境変数を読み込む。
fn require_u64(var: &'static str) -> Result<u64, ConfigError> {
    let raw = std::env::var(var).map_err(|_| ConfigError::Missing(var))?;
    parse_u64(var, &raw)
}

/// 省略可能なu64環境変数を読み込む。
fn optional_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => parse_u64(var, &raw),
        Err(_) => Ok(default),
    }
}

/// 省略可能なbool環境変数を読み込む。
fn optional_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => parse_bool(var, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("整数として解釈できません ({raw}): {e}"),
    })
}

/// u32の範囲に収まらない値は切り捨てず設定エラーにする。
fn to_u32(var: &'static str, value: u64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("値が大きすぎます ({value}): 最大{}", u32::MAX),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("真偽値として解釈できません: {other}"),
        }),
    }
}
