// 该文件是 CodeFit 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  compliance::{Inspection, Tag, TaggedItem},
  model::WithLabel,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const BOX_THICKNESS: i32 = 3;
const VIOLATION_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const OK_COLOR: [u8; 3] = [0, 128, 0]; // 绿色
const TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色

// 未指定字体时依次尝试的系统字体
const SYSTEM_FONT_PATHS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self::system()
  }
}

impl Draw {
  /// 从字体文件加载标签字体
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|e| DrawError::InvalidFont(format!("{}: {}", path.display(), e)))?;
    Ok(Self::with_font(Some(font)))
  }

  /// 使用系统字体，找不到时只绘制边框
  pub fn system() -> Self {
    for path in SYSTEM_FONT_PATHS {
      if !Path::new(path).exists() {
        continue;
      }
      match Self::with_font_file(path) {
        Ok(draw) => {
          debug!("使用系统字体: {}", path);
          return draw;
        }
        Err(e) => warn!("无法加载系统字体 {}: {}", path, e),
      }
    }
    warn!("未找到可用字体，标签文字将不会绘制");
    Self::without_font()
  }

  pub fn without_font() -> Self {
    Self::with_font(None)
  }

  fn with_font(font: Option<FontVec>) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
    }
  }

  pub fn stroke_color(tag: Tag) -> Rgb<u8> {
    match tag {
      Tag::Violation => Rgb(VIOLATION_COLOR),
      Tag::Ok => Rgb(OK_COLOR),
    }
  }

  pub fn draw_inspection_on_image<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    inspection: &Inspection<T>,
  ) {
    for tagged in &inspection.detections {
      self.draw_bbox_with_label(image, tagged);
    }
  }

  // 边框向内加粗，标签文字画在左上角
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, tagged: &TaggedItem<T>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let bbox = tagged.item.rounded_bbox();
    let x_min = (bbox[0].round() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].round() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].round() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].round() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Self::stroke_color(tagged.tag);
    for t in 0..self.thickness {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left >= right || top >= bottom {
        break;
      }
      let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    if let Some(font) = &self.font {
      let label = label_text(tagged.item.kind.label(), tagged.item.confidence_percent());
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        x_min,
        y_min,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }
}

/// 标签文字，如 `Shorts (87.5%)`
pub fn label_text(label: &str, confidence_percent: f32) -> String {
  format!("{} ({}%)", label, confidence_percent)
}
