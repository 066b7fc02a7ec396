use log::{debug, error, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// 설정 로드 오류
#[derive(Debug)]
pub enum ConfigError {
    /// 파일 오류
    FileError(String),
    /// 파싱 오류
    ParseError(String),
    /// 유효성 검사 오류
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileError(msg) => write!(f, "설정 파일 오류: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "설정 파싱 오류: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "설정 유효성 검사 오류: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 설정 로드 결과
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 설정 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    /// 파일 확장자로 판단
    Auto,
}

impl ConfigFormat {
    /// 확장자(.json / .toml)로 형식 판단
    pub fn from_extension(path: &Path) -> Option<ConfigFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(ConfigFormat::Json),
            Some("toml") => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> ConfigResult<T> {
        match self {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON 파싱 실패: {}", e))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("TOML 파싱 실패: {}", e))),
            // JSON으로 먼저 시도하고 실패하면 TOML
            ConfigFormat::Auto => ConfigFormat::Json
                .parse(content)
                .or_else(|_| ConfigFormat::Toml.parse(content)),
        }
    }

    fn render<T: Serialize>(self, config: &T) -> ConfigResult<String> {
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(config)
                .map_err(|e| ConfigError::ParseError(format!("JSON 직렬화 실패: {}", e))),
            ConfigFormat::Toml | ConfigFormat::Auto => toml::to_string_pretty(config)
                .map_err(|e| ConfigError::ParseError(format!("TOML 직렬화 실패: {}", e))),
        }
    }
}

/// 설정 유효성 검사
pub trait ConfigValidation {
    fn validate(&self) -> ConfigResult<()>;
}

/// 설정 파일 로더
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// 파일에서 설정을 읽고 검증
    ///
    /// `Auto`는 확장자로 형식을 정하며, 알 수 없는 확장자는 파일 오류입니다.
    ///
    /// # Arguments
    /// * `path` - 설정 파일 경로
    /// * `format` - 설정 파일 형식
    ///
    /// # Returns
    /// * `ConfigResult<T>` - 검증된 설정 또는 오류
    pub fn load_from_file<T>(path: &Path, format: ConfigFormat) -> ConfigResult<T>
    where
        T: DeserializeOwned + ConfigValidation,
    {
        let format = match format {
            ConfigFormat::Auto => ConfigFormat::from_extension(path).ok_or_else(|| {
                ConfigError::FileError(format!("파일 형식을 감지할 수 없음: {}", path.display()))
            })?,
            other => other,
        };
        debug!("설정 파일 로드: {} ({:?})", path.display(), format);

        let content = std::fs::read_to_string(path).map_err(|e| {
            error!("설정 파일 읽기 실패: {} - {}", path.display(), e);
            ConfigError::FileError(format!("파일 읽기 실패: {}", e))
        })?;

        let config = Self::load_from_string(&content, format).inspect_err(|e| {
            error!("설정 로드 실패: {} - {}", path.display(), e);
        })?;

        info!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 문자열에서 설정을 읽고 검증
    ///
    /// `Auto`면 JSON, TOML 순서로 시도합니다.
    pub fn load_from_string<T>(content: &str, format: ConfigFormat) -> ConfigResult<T>
    where
        T: DeserializeOwned + ConfigValidation,
    {
        let config: T = format.parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정을 파일로 저장
    ///
    /// `Auto`는 확장자를 따르고, 확장자가 없거나 알 수 없으면 TOML로 씁니다.
    ///
    /// # Arguments
    /// * `config` - 저장할 설정
    /// * `path` - 저장할 파일 경로
    /// * `format` - 설정 파일 형식
    pub fn save_to_file<T>(config: &T, path: &Path, format: ConfigFormat) -> ConfigResult<()>
    where
        T: Serialize + ConfigValidation,
    {
        config.validate()?;

        let format = match format {
            ConfigFormat::Auto => ConfigFormat::from_extension(path).unwrap_or(ConfigFormat::Toml),
            other => other,
        };
        let content = format.render(config)?;

        std::fs::write(path, content).map_err(|e| {
            error!("설정 파일 쓰기 실패: {} - {}", path.display(), e);
            ConfigError::FileError(format!("파일 쓰기 실패: {}", e))
        })?;

        info!("설정 파일 저장 완료: {}", path.display());
        Ok(())
    }
}
