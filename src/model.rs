// 该文件是 CodeFit 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果，坐标为原图像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl<T> DetectItem<T> {
  pub fn new(kind: T, score: f32, bbox: [f32; 4]) -> Self {
    Self { kind, score, bbox }
  }

  /// 保留两位小数的边框坐标，用于绘制与报告
  pub fn rounded_bbox(&self) -> [f32; 4] {
    self.bbox.map(round2)
  }

  /// 百分比形式的置信度，保留两位小数
  pub fn confidence_percent(&self) -> f32 {
    round2(self.score * 100.0)
  }
}

fn round2(value: f32) -> f32 {
  (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn label(&self) -> &str;
  fn label_id(&self) -> u32;
}

mod label;
pub use self::label::{GarmentLabel, LabelTable, LabelTableError};

#[cfg(feature = "model_yolos")]
mod yolos;
#[cfg(feature = "model_yolos")]
pub use self::yolos::{
  YOLOS_DEFAULT_THRESHOLD, Yolos, YolosBuilder, YolosError, postprocess, preprocess,
  resize_dimensions,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounded_bbox_keeps_two_decimals() {
    let item = DetectItem::new(GarmentLabel::new(0, "shoe"), 0.87654, [1.234, 5.678, 9.999, 10.0]);
    assert_eq!(item.rounded_bbox(), [1.23, 5.68, 10.0, 10.0]);
    assert_eq!(item.confidence_percent(), 87.65);
  }

  #[test]
  fn detect_result_from_vec() {
    let result: DetectResult<GarmentLabel> = Vec::new().into();
    assert!(result.is_empty());
    assert_eq!(result.len(), 0);
  }
}
