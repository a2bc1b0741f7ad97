//! Newline-delimited JSON files
//!
//! Used by the in-memory repository's event log and by the deletion
//! fallback log. One serialized record per line, append-only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::errors::{Result, ShortenerError};

/// 可回滚的追加目标
pub trait AppendTarget: Write {
    /// 当前末尾位置
    fn end_offset(&mut self) -> io::Result<u64>;

    /// 截断到 `len`，丢弃其后的内容
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    fn sync_all(&mut self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn end_offset(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }
}

/// 追加写入器
///
/// 每条记录整行写入；写入失败时文件被截断回写入前的长度，
/// 失败的记录不会在之后的写入中落盘。
pub struct NdjsonWriter<F: AppendTarget = File> {
    target: F,
}

impl NdjsonWriter<File> {
    /// 以追加模式打开文件，必要时创建父目录
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ShortenerError::file_operation(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ShortenerError::file_operation(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self::new(file))
    }
}

impl<F: AppendTarget> NdjsonWriter<F> {
    pub fn new(target: F) -> Self {
        Self { target }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let start = self.target.end_offset()?;
        if let Err(e) = self
            .target
            .write_all(&line)
            .and_then(|()| self.target.flush())
        {
            // 半行或未确认的记录不能留在日志里
            if let Err(rollback) = self.target.truncate(start) {
                error!(
                    "Failed to roll back partial log record at offset {}: {}",
                    start, rollback
                );
            }
            return Err(ShortenerError::file_operation(format!(
                "Failed to append log record: {}",
                e
            )));
        }
        Ok(())
    }

    /// 刷新到磁盘（fsync）
    pub fn sync(&mut self) -> Result<()> {
        self.target.sync_all()?;
        Ok(())
    }
}

/// 按顺序读取所有记录，文件不存在时返回空列表
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ShortenerError::file_operation(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            ShortenerError::serialization(format!(
                "{}:{}: {}",
                path.display(),
                index + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}
