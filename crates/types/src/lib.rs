//! # Onboard Storage Gateway 共有型定義
//!
//! Gatewayとクライアント（アップロード処理側）の間で交換される
//! データ構造をRust構造体として提供する。
//!
//! ## 設計方針
//! - バイト数はすべて`u64`（マルチテラバイトのコンテナでも桁あふれしない）
//! - URL有効期限はUNIXタイムスタンプ（秒）で返却する
//! - 容量超過はエラーではなく`AdmissionDecision`の値として表現する

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 入庫判定 (Admission)
// ---------------------------------------------------------------------------

/// POST /admission/check リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionCheckRequest {
    /// アップロード予定オブジェクトの申告サイズ（バイト）
    pub declared_bytes: u64,
}

/// 入庫判定の結果。
///
/// 毎回の判定で新規に生成され、キャッシュされない
/// （キャッシュされるのは入力である使用量スナップショットのみ）。
/// `allowed: false`は正常な業務上の判断であり、エラーとして伝播しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// 入庫を許可するか
    pub allowed: bool,
    /// 判定に使用したコンテナ使用量（バイト）
    pub current_used_bytes: u64,
    /// コンテナの最大許容量（バイト）
    pub max_allowed_bytes: u64,
    /// 申告されたオブジェクトサイズ（バイト）
    pub declared_object_bytes: u64,
    /// 入庫すると最大許容量を超過するか
    pub would_exceed: bool,
}

// ---------------------------------------------------------------------------
// /upload-url
// ---------------------------------------------------------------------------

/// POST /upload-url リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    /// 元のファイル名（オブジェクトキー生成時にサニタイズされる）
    pub file_name: String,
    /// コンテンツのMIMEタイプ
    pub content_type: String,
    /// コンテンツサイズ（バイト）
    pub content_size: u64,
    /// コンテナ内のスコープ（例: テナントや顧客の識別子）
    pub scope: String,
    /// オブジェクトのカテゴリ（例: "contracts", "avatars"）
    pub category: String,
}

/// POST /upload-url レスポンス。
///
/// 入庫判定の結果によって`admitted`と`rejected`のいずれかを返す。
/// 拒否時は判定内容をそのまま含め、クライアントが現在量/上限を表示できるようにする。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadUrlOutcome {
    /// 入庫許可。署名付きアップロードURLを発行済み。
    Admitted {
        /// 署名付きアップロードURL（PUT）
        upload_url: String,
        /// 生成されたオブジェクトキー
        object_key: String,
        /// URL有効期限（UNIXタイムスタンプ）
        expires_at: u64,
    },
    /// 容量超過による拒否。
    Rejected {
        /// 判定の詳細（現在量・上限・申告サイズ）
        decision: AdmissionDecision,
    },
}

// ---------------------------------------------------------------------------
// /download-url
// ---------------------------------------------------------------------------

/// POST /download-url リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrlRequest {
    /// 対象オブジェクトのキー
    pub object_key: String,
}

/// POST /download-url レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrlResponse {
    /// 署名付きダウンロードURL（GET）
    pub download_url: String,
    /// URL有効期限（UNIXタイムスタンプ）。署名の真の有効期限であり、
    /// キャッシュから返却された場合も発行時の値がそのまま入る
    /// （安全マージン分の残り有効期間は常に確保される）。
    pub expires_at: u64,
}

// ---------------------------------------------------------------------------
// /upload-completed
// ---------------------------------------------------------------------------

/// POST /upload-completed リクエスト。
///
/// クライアントはオブジェクトの書き込み成功を確認した後にのみ呼び出すこと。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCompletedRequest {
    /// 書き込みが完了したオブジェクトのキー
    pub object_key: String,
}

// ---------------------------------------------------------------------------
// 使用量
// ---------------------------------------------------------------------------

/// 使用量計測エンドポイントから取得したコンテナ使用量の内訳。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// オブジェクト本体の合計バイト数
    pub payload_bytes: u64,
    /// メタデータの合計バイト数
    pub metadata_bytes: u64,
    /// オブジェクト数
    pub object_count: u64,
}

impl UsageTotals {
    /// 本体とメタデータを合算したコンテナ使用量（バイト）。
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.payload_bytes.saturating_add(self.metadata_bytes)
    }
}

/// GET /usage レスポンス。運用者向けの使用量ビュー。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// 容量チェックが有効か（killスイッチの状態）
    pub quota_check_enabled: bool,
    /// コンテナ使用量（バイト）。killスイッチ無効時は0。
    pub used_bytes: u64,
    /// コンテナの最大許容量（バイト）
    pub max_container_bytes: u64,
    /// 残り容量（バイト）
    pub remaining_bytes: u64,
}
