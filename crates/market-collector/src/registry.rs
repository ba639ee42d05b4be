//! 이름 붙은 설정 파일 경로 레지스트리.
//!
//! `{root}/paths.json`에 `이름 → 설정 파일 경로`를 보관하며 `default` 항목이
//! 기본 설정입니다. 루트는 `FXDATA_HOME` 환경변수, 없으면
//! `{config_dir}/fxdata`입니다.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use market_core::DEFAULT_CONFIG_TEMPLATE;
use tracing::{debug, info};

use crate::error::{CollectorError, Result};

/// 기본 설정 항목 이름
pub const DEFAULT_ENTRY: &str = "default";

const PATHS_FILE: &str = "paths.json";
const EXPORT_FILE: &str = "config.toml";

/// 설정 경로 레지스트리
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    root: PathBuf,
}

impl ConfigRegistry {
    /// 지정한 루트 디렉터리로 생성
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 환경변수 또는 사용자 설정 디렉터리에서 루트 결정
    pub fn from_env() -> Result<Self> {
        if let Ok(home) = std::env::var("FXDATA_HOME") {
            return Ok(Self::new(home));
        }

        if let Some(config_dir) = dirs::config_dir() {
            return Ok(Self::new(config_dir.join("fxdata")));
        }

        if let Some(home) = dirs::home_dir() {
            return Ok(Self::new(home.join(".fxdata")));
        }

        Err(CollectorError::Registry(
            "설정 디렉터리를 찾을 수 없습니다 (FXDATA_HOME 설정 필요)".to_string(),
        ))
    }

    /// 레지스트리 루트
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn paths_file(&self) -> PathBuf {
        self.root.join(PATHS_FILE)
    }

    /// 등록된 전체 항목 (파일이 없으면 비어 있음)
    pub fn entries(&self) -> Result<BTreeMap<String, PathBuf>> {
        let path = self.paths_file();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            CollectorError::Registry(format!("{} 파싱 실패: {}", path.display(), e))
        })
    }

    fn save(&self, entries: &BTreeMap<String, PathBuf>) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.paths_file(), serde_json::to_string_pretty(entries)?)?;
        debug!(entries = entries.len(), "레지스트리 저장");
        Ok(())
    }

    /// 기본 설정 파일 경로
    pub fn default_path(&self) -> Result<Option<PathBuf>> {
        Ok(self.entries()?.remove(DEFAULT_ENTRY))
    }

    /// 설정 경로 등록
    ///
    /// `copy`이면 파일을 레지스트리 루트로 복사한 뒤 복사본을 등록합니다.
    pub fn add(&self, name: &str, path: &Path, copy: bool) -> Result<PathBuf> {
        let path = if copy {
            let file_name = path.file_name().ok_or_else(|| {
                CollectorError::Registry(format!("파일 경로가 아닙니다: {}", path.display()))
            })?;
            fs::create_dir_all(&self.root)?;
            let target = self.root.join(file_name);
            fs::copy(path, &target)?;
            target
        } else {
            path.to_path_buf()
        };
        let path = std::path::absolute(&path)?;

        let mut entries = self.entries()?;
        entries.insert(name.to_string(), path.clone());
        self.save(&entries)?;

        info!(name = name, path = %path.display(), "설정 경로 등록");
        Ok(path)
    }

    /// 이름으로 찾은 경로를 기본 설정으로 지정
    pub fn use_entry(&self, name: &str) -> Result<PathBuf> {
        let mut entries = self.entries()?;
        let path = entries
            .get(name)
            .cloned()
            .ok_or_else(|| CollectorError::Registry(format!("등록되지 않은 이름: {}", name)))?;

        entries.insert(DEFAULT_ENTRY.to_string(), path.clone());
        self.save(&entries)?;

        info!(name = name, path = %path.display(), "기본 설정 변경");
        Ok(path)
    }

    /// 이름들을 삭제
    ///
    /// 하나라도 등록되지 않은 이름이면 아무것도 삭제하지 않습니다.
    pub fn delete(&self, names: &[String]) -> Result<()> {
        let mut entries = self.entries()?;
        if let Some(missing) = names.iter().find(|n| !entries.contains_key(n.as_str())) {
            return Err(CollectorError::Registry(format!(
                "등록되지 않은 이름: {}",
                missing
            )));
        }

        for name in names {
            entries.remove(name);
        }
        self.save(&entries)
    }

    /// 기본 설정 템플릿을 파일로 내보내기
    ///
    /// `path`가 디렉터리이면 그 안에 `config.toml`을 만듭니다. `name`이 있으면
    /// 내보낸 파일을 그 이름으로 등록합니다.
    pub fn export(&self, path: &Path, name: Option<&str>, copy: bool) -> Result<PathBuf> {
        let target = if path.is_dir() {
            path.join(EXPORT_FILE)
        } else {
            path.to_path_buf()
        };

        fs::write(&target, DEFAULT_CONFIG_TEMPLATE)?;
        info!(path = %target.display(), "기본 설정 내보내기");

        match name {
            Some(name) => self.add(name, &target, copy),
            None => Ok(std::path::absolute(&target)?),
        }
    }
}
