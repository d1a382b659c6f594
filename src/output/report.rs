// 该文件是 CodeFit 项目的一部分。
// src/output/report.rs - JSON 检测报告
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

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  compliance::{Inspection, Tag, Verdict},
  model::WithLabel,
  output::Render,
};

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct ReportDetection<'a> {
  pub label: &'a str,
  pub class_id: u32,
  pub confidence: f32,
  pub bbox: [f32; 4],
  pub tag: Tag,
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
  pub inspected_at: String,
  pub source: &'a str,
  pub confidence_threshold: f32,
  pub detections: Vec<ReportDetection<'a>>,
  pub verdict: &'a Verdict,
}

impl<'a> Report<'a> {
  pub fn new<T: WithLabel>(source: &'a str, inspection: &'a Inspection<T>) -> Self {
    let detections = inspection
      .detections
      .iter()
      .map(|tagged| ReportDetection {
        label: tagged.item.kind.label(),
        class_id: tagged.item.kind.label_id(),
        confidence: tagged.item.score,
        bbox: tagged.item.rounded_bbox(),
        tag: tagged.tag,
      })
      .collect();

    Self {
      inspected_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
      source,
      confidence_threshold: inspection.confidence_threshold,
      detections,
      verdict: &inspection.verdict,
    }
  }
}

/// 将检测结果写为 JSON 文件
pub struct ReportOutput {
  path: PathBuf,
  source: String,
}

impl ReportOutput {
  pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      source: source.into(),
    }
  }
}

impl<T: WithLabel> Render<RgbImage, Inspection<T>> for ReportOutput {
  type Error = ReportError;

  fn render_result(&self, _frame: &RgbImage, result: &Inspection<T>) -> Result<(), Self::Error> {
    let report = Report::new(&self.source, result);
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, serde_json::to_string_pretty(&report)?)?;
    info!("保存检测报告到文件: {}", self.path.display());
    Ok(())
  }
}
