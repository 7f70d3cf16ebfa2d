use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーの二要素認証（TOTP）レコード
///
/// ライフサイクル:
/// 作成時は PENDING（secret あり、enabled=false）、
/// 初回コード検証成功で ACTIVE（enabled=true, verified=true）、
/// 無効化で行ごと削除（UNCONFIGURED に戻る）。
///
/// シークレット平文はレスポンスにもログにも出力禁止
#[derive(Debug, FromRow, Serialize)]
pub struct User2fa {
    pub user_id: Uuid,
    /// Base32エンコードされた共有シークレット（アクセス制限列）
    #[serde(skip)]
    pub secret: String,
    pub enabled: bool,
    /// 直近のチャレンジが成功したかどうか
    pub verified: bool,
    /// 最終検証時刻（信頼ウィンドウ判定に使用）
    pub last_verification_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
