use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // 2FA (TOTP) 設定
    /// TOTP発行者名（認証アプリに表示される）
    pub totp_issuer: String,
    /// コード検証で許容する前後の時間ステップ数
    #[serde(default = "default_totp_skew_steps")]
    pub totp_skew_steps: u8,
    /// 検証成功後、再チャレンジを要求しない信頼ウィンドウ（分）
    #[serde(default = "default_totp_trust_window_mins")]
    pub totp_trust_window_mins: i64,

    // ペイロード暗号化設定
    /// AES-256-CBC キー（hexエンコード、32バイト）
    pub payload_key: SecretBox<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOTP_SKEW_STEPS: u8 = 1;
const DEFAULT_TOTP_TRUST_WINDOW_MINS: i64 = 180;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_totp_skew_steps() -> u8 {
    DEFAULT_TOTP_SKEW_STEPS
}

fn default_totp_trust_window_mins() -> i64 {
    DEFAULT_TOTP_TRUST_WINDOW_MINS
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
