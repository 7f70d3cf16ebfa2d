use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザー
///
/// ユーザー管理そのものは外部システムの責務。
/// 本サービスは2FAポリシー判定に必要な最小限の列のみ読み取る。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// ロール文字列（"admin" / "superadmin" が管理者層）
    pub role: String,
    pub created_at: OffsetDateTime,
}

impl User {
    /// 管理者層かどうか
    ///
    /// 管理者層は自身で2FAを無効化できない。
    pub fn is_admin_tier(&self) -> bool {
        matches!(self.role.as_str(), "admin" | "superadmin")
    }
}
