use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 程序配置文件
///
/// 加载顺序：默认值 → `lms.toml`（或 `LMS_CONFIG` 指定的文件）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LMS 后端地址
    pub api_base_url: String,
    /// 本地缓存文件（刷新/重启后仍保留答题进度）
    pub cache_file: String,
    /// 结果页停留时间（秒），之后清理缓存并退出
    pub result_grace_secs: u64,
    /// 交卷失败时的自动重试次数
    pub submit_retries: usize,
    /// 交卷重试间隔（毫秒）
    pub submit_retry_delay_ms: u64,
    /// HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            cache_file: ".take_test_cache.json".to_string(),
            result_grace_secs: 5,
            submit_retries: 3,
            submit_retry_delay_ms: 2000,
            request_timeout_secs: 30,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 读取配置文件（可选）并应用环境变量覆盖
    pub fn load() -> Self {
        let path = std::env::var("LMS_CONFIG").unwrap_or_else(|_| "lms.toml".to_string());
        let base = match Self::from_file(Path::new(&path)) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("⚠️ 配置文件 {} 解析失败，使用默认配置: {}", path, e);
                Self::default()
            }
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件加载，文件不存在时返回 `None`
    pub fn from_file(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&content)?))
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(self.api_base_url),
            cache_file: std::env::var("CACHE_FILE").unwrap_or(self.cache_file),
            result_grace_secs: env_parse("RESULT_GRACE_SECS").unwrap_or(self.result_grace_secs),
            submit_retries: env_parse("SUBMIT_RETRIES").unwrap_or(self.submit_retries),
            submit_retry_delay_ms: env_parse("SUBMIT_RETRY_DELAY_MS")
                .unwrap_or(self.submit_retry_delay_ms),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(self.request_timeout_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    pub fn result_grace_period(&self) -> Duration {
        Duration::from_secs(self.result_grace_secs)
    }

    pub fn submit_retry_delay(&self) -> Duration {
        Duration::from_millis(self.submit_retry_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
