use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User2fa;

#[derive(Clone)]
pub struct User2faRepository {
    pool: PgPool,
}

impl User2faRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーIDで2FAレコードを検索
    pub async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<User2fa>, sqlx::Error> {
        sqlx::query_as::<_, User2fa>(
            r#"
            SELECT user_id, secret, enabled, verified, last_verification_at,
                   created_at, updated_at
            FROM user_2fa
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 2FAレコードを PENDING 状態で作成または再生成
    ///
    /// # Note
    /// enabled = false, verified = false で保存し、
    /// 初回コード検証成功後に activate() を呼び出す。
    /// 既存行があれば単一文で上書きする（旧シークレットは無効化）。
    /// delete + insert の2文に分けると並行 setup で行が消えたり
    /// 重複キーエラーになるため upsert にしている。
    pub async fn upsert_pending(&self, user_id: Uuid, secret: &str) -> Result<User2fa, sqlx::Error> {
        sqlx::query_as::<_, User2fa>(
            r#"
            INSERT INTO user_2fa (user_id, secret)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET secret = EXCLUDED.secret, enabled = false, verified = false,
                last_verification_at = NULL, updated_at = NOW()
            RETURNING user_id, secret, enabled, verified, last_verification_at,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(secret)
        .fetch_one(&self.pool)
        .await
    }

    /// 2FAを有効化（PENDING → ACTIVE）
    ///
    /// 初回検証の成功を兼ねるため verified と検証時刻も同時に立てる
    pub async fn activate(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_2fa
            SET enabled = true, verified = true,
                last_verification_at = NOW(), updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// チャレンジ成功を記録（verified=true、検証時刻を更新）
    ///
    /// 同一ユーザーへの並行呼び出しは last-write-wins で構わない
    /// （「直近検証済み」の意味は冪等なため）
    pub async fn mark_verified(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_2fa
            SET verified = true, last_verification_at = NOW(), updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 2FAレコードを削除（シークレット・フラグもろとも破棄）
    pub async fn delete(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM user_2fa
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
