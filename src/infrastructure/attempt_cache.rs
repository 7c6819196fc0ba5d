//! 本地答题缓存 - 基础设施层
//!
//! 持有唯一的持久化存储，只暴露 get / put / remove 能力。
//! 进程重启后数据仍然存在，答题结束后由调用方负责清理。

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CacheError;

/// 试卷数据（启动考试前写入）
pub const TEST_STATE_KEY: &str = "testState";
/// 网关返回的答题记录ID
pub const ATTEMPT_ID_KEY: &str = "testResultId";
/// 登录令牌
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// 键值缓存接口
pub trait AttemptCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// 读取并反序列化为指定类型
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::Serde {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// 序列化后写入
    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Serde {
            key: key.to_string(),
            source,
        })?;
        self.put(key, &raw)
    }
}

/// 基于 JSON 文件的持久化缓存
///
/// 每次写入都会落盘（先写临时文件再 rename），进程崩溃后重新打开不会丢数据。
pub struct FileAttemptCache {
    path: PathBuf,
    entries: Mutex<Map<String, JsonValue>>,
}

impl FileAttemptCache {
    /// 打开缓存文件，不存在时创建空缓存
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| CacheError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content).map_err(|source| CacheError::Serde {
                    key: path.display().to_string(),
                    source,
                })?
            }
        } else {
            Map::new()
        };

        debug!("打开缓存文件: {} ({} 项)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Map<String, JsonValue>) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let content = serde_json::to_string_pretty(entries).map_err(|source| CacheError::Serde {
            key: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, JsonValue>> {
        // 写入中途 panic 不影响已落盘的数据，直接取回内部值
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("缓存锁被污染，继续使用内部数据");
            poisoned.into_inner()
        })
    }
}

impl AttemptCache for FileAttemptCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.lock();
        Ok(entries
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), JsonValue::String(value.to_string()));
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// 内存缓存，仅用于测试和不需要持久化的场景
#[derive(Default)]
pub struct MemoryAttemptCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryAttemptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl AttemptCache for MemoryAttemptCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .lock()
            .map(|entries| entries.get(key).cloned())
            .unwrap_or(None))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        Ok(())
    }
}

impl<C: AttemptCache + ?Sized> AttemptCache for std::sync::Arc<C> {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        (**self).remove(key)
    }
}
