//! Fallback log for delete batches that were not applied before shutdown
//!
//! Newline-delimited JSON, one `DeleteRequestBatch` per line. The
//! coordinator only appends; recovery is manual through
//! [`apply_fallback_log`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::errors::{Result, ShortenerError};
use crate::storage::{DeleteRequestBatch, UrlRepository};
use crate::utils::ndjson::{self, NdjsonWriter};

#[derive(Debug, Clone)]
pub struct FallbackLog {
    path: PathBuf,
}

impl FallbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加写入并 fsync
    pub fn append(&self, batches: &[DeleteRequestBatch]) -> Result<()> {
        let mut writer = NdjsonWriter::open(&self.path)?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.sync()
    }
}

/// 读取回退日志中的全部批次
pub fn read_fallback_log(path: &Path) -> Result<Vec<DeleteRequestBatch>> {
    ndjson::read_records(path)
}

/// 手动恢复：把回退日志中的批次应用到仓库
///
/// 成功后日志被重命名为 `<path>.applied.<timestamp>`，避免重复处理；
/// 删除本身是幂等的，重复应用也不会产生副作用。
pub async fn apply_fallback_log(repository: &dyn UrlRepository, path: &Path) -> Result<usize> {
    let batches = read_fallback_log(path)?;
    if batches.is_empty() {
        warn!("Fallback log {} is empty or missing", path.display());
        return Ok(0);
    }

    repository.delete(&batches).await?;

    let archived = PathBuf::from(format!(
        "{}.applied.{}",
        path.display(),
        Utc::now().format("%Y%m%d%H%M%S")
    ));
    std::fs::rename(path, &archived).map_err(|e| {
        ShortenerError::file_operation(format!(
            "Applied {} batches but failed to archive {}: {}",
            batches.len(),
            path.display(),
            e
        ))
    })?;

    info!(
        "Applied {} delete batches from {}, archived to {}",
        batches.len(),
        path.display(),
        archived.display()
    );
    Ok(batches.len())
}
