//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STUDYBOT__*` 覆盖（双下划线表示嵌套，如 `STUDYBOT__DIALOG__ANSWER_TIMEOUT_SECS=60`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub dialog: DialogSection,
    #[serde(default)]
    pub reminders: RemindersSection,
}

/// [app] 段：数据目录（三个 JSON 文档所在位置）
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// [telegram] 段：Bot API 令牌与长轮询参数
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// 未设置时读取环境变量 TELEGRAM_TOKEN
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// getUpdates 长轮询超时（秒）
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl TelegramSection {
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("TELEGRAM_TOKEN").ok())
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    10
}

/// [dialog] 段：单次回答的等待时间与格式校验重试次数
#[derive(Debug, Clone, Deserialize)]
pub struct DialogSection {
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for DialogSection {
    fn default() -> Self {
        Self {
            answer_timeout_secs: default_answer_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl DialogSection {
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

fn default_answer_timeout_secs() -> u64 {
    600
}

fn default_max_attempts() -> usize {
    3
}

/// [reminders] 段：预通知 / 最终通知相对 fire_at 的提前量，以及新提醒的最早时间
#[derive(Debug, Clone, Deserialize)]
pub struct RemindersSection {
    #[serde(default = "default_pre_notice_lead_hours")]
    pub pre_notice_lead_hours: i64,
    #[serde(default = "default_final_notice_lead_hours")]
    pub final_notice_lead_hours: i64,
    #[serde(default = "default_min_lead_hours")]
    pub min_lead_hours: i64,
}

impl Default for RemindersSection {
    fn default() -> Self {
        Self {
            pre_notice_lead_hours: default_pre_notice_lead_hours(),
            final_notice_lead_hours: default_final_notice_lead_hours(),
            min_lead_hours: default_min_lead_hours(),
        }
    }
}

fn default_pre_notice_lead_hours() -> i64 {
    26
}

fn default_final_notice_lead_hours() -> i64 {
    2
}

fn default_min_lead_hours() -> i64 {
    2
}

/// 从 config 目录加载配置，环境变量 STUDYBOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 STUDYBOT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STUDYBOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
