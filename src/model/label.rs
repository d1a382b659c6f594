// 该文件是 CodeFit 项目的一部分。
// src/model/label.rs - 类别标签表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::WithLabel;

const FASHIONPEDIA_LABELS: &str = include_str!("../../labels/fashionpedia.toml");
const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelTableError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签表解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("重复的类别编号: {0}")]
  DuplicateId(u32),
}

/// 带有类别编号的服装标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GarmentLabel {
  id: u32,
  name: String,
}

impl GarmentLabel {
  pub fn new(id: u32, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
    }
  }
}

impl WithLabel for GarmentLabel {
  fn label(&self) -> &str {
    &self.name
  }

  fn label_id(&self) -> u32 {
    self.id
  }
}

#[derive(Deserialize)]
struct LabelFile {
  #[serde(default)]
  label: Vec<LabelEntry>,
}

#[derive(Deserialize)]
struct LabelEntry {
  id: u32,
  name: String,
}

/// 模型类别编号到名称的映射
#[derive(Debug, Clone)]
pub struct LabelTable {
  names: BTreeMap<u32, String>,
}

impl LabelTable {
  /// 内置的 Fashionpedia 标签表
  pub fn fashionpedia() -> Self {
    Self::from_toml_str(FASHIONPEDIA_LABELS).expect("无法解析内置的标签表")
  }

  pub fn from_toml_str(content: &str) -> Result<Self, LabelTableError> {
    let file: LabelFile = toml::from_str(content)?;
    let mut names = BTreeMap::new();
    for LabelEntry { id, name } in file.label {
      if names.insert(id, name).is_some() {
        return Err(LabelTableError::DuplicateId(id));
      }
    }
    debug!("标签表共 {} 个类别", names.len());
    Ok(Self { names })
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelTableError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn name(&self, id: u32) -> Option<&str> {
    self.names.get(&id).map(String::as_str)
  }

  /// 未登记的编号映射为 "unknown"
  pub fn get(&self, id: u32) -> GarmentLabel {
    GarmentLabel::new(id, self.name(id).unwrap_or(UNKNOWN_LABEL))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}
