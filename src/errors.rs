use std::fmt;

#[derive(Debug, Clone)]
pub enum ShortenerError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    UrlExists(String),
    Serialization(String),
    CoordinatorStopped(String),
}

impl ShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortenerError::DatabaseConfig(_) => "E001",
            ShortenerError::DatabaseConnection(_) => "E002",
            ShortenerError::DatabaseOperation(_) => "E003",
            ShortenerError::FileOperation(_) => "E004",
            ShortenerError::Validation(_) => "E005",
            ShortenerError::UrlExists(_) => "E006",
            ShortenerError::Serialization(_) => "E007",
            ShortenerError::CoordinatorStopped(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortenerError::DatabaseConfig(_) => "Database Configuration Error",
            ShortenerError::DatabaseConnection(_) => "Database Connection Error",
            ShortenerError::DatabaseOperation(_) => "Database Operation Error",
            ShortenerError::FileOperation(_) => "File Operation Error",
            ShortenerError::Validation(_) => "Validation Error",
            ShortenerError::UrlExists(_) => "URL Already Exists",
            ShortenerError::Serialization(_) => "Serialization Error",
            ShortenerError::CoordinatorStopped(_) => "Deletion Coordinator Stopped",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortenerError::DatabaseConfig(msg) => msg,
            ShortenerError::DatabaseConnection(msg) => msg,
            ShortenerError::DatabaseOperation(msg) => msg,
            ShortenerError::FileOperation(msg) => msg,
            ShortenerError::Validation(msg) => msg,
            ShortenerError::UrlExists(msg) => msg,
            ShortenerError::Serialization(msg) => msg,
            ShortenerError::CoordinatorStopped(msg) => msg,
        }
    }

    /// 去重冲突：调用方可以继续使用已被改写为现有短码的事件
    pub fn is_conflict(&self) -> bool {
        matches!(self, ShortenerError::UrlExists(_))
    }

    /// 启动阶段遇到时应直接退出：数据库不可用，或事件日志无法打开/解析
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShortenerError::DatabaseConfig(_)
                | ShortenerError::DatabaseConnection(_)
                | ShortenerError::FileOperation(_)
                | ShortenerError::Serialization(_)
        )
    }

    /// 格式化为彩色输出
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortenerError {}

// 便捷的构造函数
impl ShortenerError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Validation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Serialization(msg.into())
    }

    pub fn coordinator_stopped<T: Into<String>>(msg: T) -> Self {
        ShortenerError::CoordinatorStopped(msg.into())
    }

    /// 把一次 save 中收集到的所有去重冲突合并成一个错误
    pub fn url_exists(urls: &[String]) -> Self {
        ShortenerError::UrlExists(format!("URL exist: {}", urls.join(", ")))
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ShortenerError {
    fn from(err: sea_orm::DbErr) -> Self {
        ShortenerError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ShortenerError {
    fn from(err: std::io::Error) -> Self {
        ShortenerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;
