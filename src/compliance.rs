// 该文件是 CodeFit 项目的一部分。
// src/compliance.rs - 着装合规判定
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

//! 检测结果到合规结论的判定流程。
//!
//! 判定只关心“某类服装是否出现”，同一类别的多个实例合并为一项。
//! 类别名称按区分大小写的完全匹配与词表比较。

use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DetectItem, DetectResult, WithLabel};

pub const DEFAULT_ALLOWED: [&str; 8] = [
  "Collared shirts",
  "Blouses",
  "Shirts",
  "Skirt",
  "Dress",
  "Pants",
  "Formal shoes",
  "Sneakers",
];

pub const DEFAULT_PROHIBITED: [&str; 3] = ["T-shirt", "Shorts", "Short skirt"];

#[derive(Error, Debug)]
pub enum VocabularyError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("词表解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("类别同时出现在允许与禁止列表中: {0:?}")]
  Overlap(Vec<String>),
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("置信度阈值必须是 [0, 1] 内的有限值, 实际为 {0}")]
pub struct ThresholdError(pub f32);

/// 校验置信度阈值，NaN 与区间外的值一律拒绝
pub fn check_confidence_threshold(threshold: f32) -> Result<f32, ThresholdError> {
  if (0.0..=1.0).contains(&threshold) {
    Ok(threshold)
  } else {
    Err(ThresholdError(threshold))
  }
}

#[derive(Deserialize)]
struct VocabularyFile {
  #[serde(default)]
  allowed: Vec<String>,
  #[serde(default)]
  prohibited: Vec<String>,
}

/// 允许与禁止的服装类别，两者互不相交
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
  allowed: BTreeSet<String>,
  prohibited: BTreeSet<String>,
}

impl Default for Vocabulary {
  fn default() -> Self {
    Self {
      allowed: DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect(),
      prohibited: DEFAULT_PROHIBITED.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl Vocabulary {
  pub fn new<A, P>(allowed: A, prohibited: P) -> Result<Self, VocabularyError>
  where
    A: IntoIterator,
    A::Item: Into<String>,
    P: IntoIterator,
    P::Item: Into<String>,
  {
    let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();
    let prohibited: BTreeSet<String> = prohibited.into_iter().map(Into::into).collect();

    let overlap: Vec<String> = allowed.intersection(&prohibited).cloned().collect();
    if !overlap.is_empty() {
      return Err(VocabularyError::Overlap(overlap));
    }

    Ok(Self {
      allowed,
      prohibited,
    })
  }

  pub fn from_toml_str(content: &str) -> Result<Self, VocabularyError> {
    let file: VocabularyFile = toml::from_str(content)?;
    Self::new(file.allowed, file.prohibited)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn allowed(&self) -> &BTreeSet<String> {
    &self.allowed
  }

  pub fn prohibited(&self) -> &BTreeSet<String> {
    &self.prohibited
  }

  pub fn is_prohibited(&self, label: &str) -> bool {
    self.prohibited.contains(label)
  }

  pub fn is_known(&self, label: &str) -> bool {
    self.allowed.contains(label) || self.prohibited.contains(label)
  }

  /// 绘制用标记，只决定边框颜色，不影响结论
  pub fn tag(&self, label: &str) -> Tag {
    if self.is_prohibited(label) {
      Tag::Violation
    } else {
      Tag::Ok
    }
  }

  /// 结论中未在任何列表中登记的类别
  pub fn unknown_items<'a>(&self, verdict: &'a Verdict) -> Vec<&'a str> {
    verdict
      .detected_items
      .iter()
      .filter(|label| !self.is_known(label))
      .map(String::as_str)
      .collect()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
  Violation,
  Ok,
}

impl Tag {
  pub fn as_str(&self) -> &'static str {
    match self {
      Tag::Violation => "violation",
      Tag::Ok => "ok",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
  pub detected_items: BTreeSet<String>,
  pub violations: BTreeSet<String>,
  pub compliant: bool,
}

/// 根据检测结果与词表得出合规结论
///
/// 置信度低于 `confidence_threshold` 的检测会被忽略；
/// 未登记的类别计入 `detected_items`，但不视为违规。
pub fn classify<T: WithLabel>(
  detections: &[DetectItem<T>],
  vocabulary: &Vocabulary,
  confidence_threshold: f32,
) -> Verdict {
  let detected_items: BTreeSet<String> = detections
    .iter()
    .filter(|item| item.score >= confidence_threshold)
    .map(|item| item.kind.label().to_string())
    .collect();

  let violations: BTreeSet<String> = detected_items
    .intersection(&vocabulary.prohibited)
    .cloned()
    .collect();

  let compliant = violations.is_empty();

  Verdict {
    detected_items,
    violations,
    compliant,
  }
}

#[derive(Debug, Clone)]
pub struct TaggedItem<T> {
  pub item: DetectItem<T>,
  pub tag: Tag,
}

/// 单张图像的检测与判定结果
#[derive(Debug, Clone)]
pub struct Inspection<T> {
  pub detections: Vec<TaggedItem<T>>,
  pub verdict: Verdict,
  pub confidence_threshold: f32,
}

impl<T: WithLabel> Inspection<T> {
  pub fn new(result: DetectResult<T>, vocabulary: &Vocabulary, confidence_threshold: f32) -> Self {
    let verdict = classify(&result.items, vocabulary, confidence_threshold);
    let detections = result
      .items
      .into_vec()
      .into_iter()
      .filter(|item| item.score >= confidence_threshold)
      .map(|item| TaggedItem {
        tag: vocabulary.tag(item.kind.label()),
        item,
      })
      .collect();

    Self {
      detections,
      verdict,
      confidence_threshold,
    }
  }
}
