// 该文件是 CodeFit 项目的一部分。
// src/model/yolos.rs - YOLOS 服装检测模型
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

use std::{fmt::Display, path::PathBuf, sync::Mutex};

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use ndarray::{Array4, ArrayView1, ArrayView2, ArrayViewD, Axis, Ix3};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  compliance::{ThresholdError, check_confidence_threshold},
  model::{DetectItem, DetectResult, GarmentLabel, LabelTable, LabelTableError, Model},
};

const YOLOS_NUM_INPUTS: usize = 1;
const YOLOS_SHORTEST_EDGE: u32 = 800;
const YOLOS_LONGEST_EDGE: u32 = 1333;
const YOLOS_SIZE_DIVISOR: u32 = 16;
const YOLOS_IMAGE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const YOLOS_IMAGE_STD: [f32; 3] = [0.229, 0.224, 0.225];
const YOLOS_LOGITS_OUTPUT: &str = "logits";
const YOLOS_BOXES_OUTPUT: &str = "pred_boxes";
const YOLOS_DEFAULT_THREADS: usize = 4;
pub const YOLOS_DEFAULT_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum YolosError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误（{0}）: {1}")]
  OrtError(&'static str, String),
  #[error("标签表错误: {0}")]
  LabelTableError(#[from] LabelTableError),
  #[error("输出张量形状错误: {0}")]
  ShapeError(String),
  #[error("输入图像为空")]
  EmptyImage,
  #[error("推理会话锁获取失败")]
  SessionPoisoned,
  #[error(transparent)]
  InvalidThreshold(#[from] ThresholdError),
}

impl YolosError {
  fn ort<E: Display>(stage: &'static str) -> impl FnOnce(E) -> Self {
    move |e| YolosError::OrtError(stage, e.to_string())
  }
}

/// 基于 ONNX Runtime 的 YOLOS 检测器
pub struct Yolos {
  session: Mutex<Session>,
  input_name: String,
  logits_output: String,
  boxes_output: String,
  labels: LabelTable,
  threshold: f32,
}

impl std::fmt::Debug for Yolos {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Yolos")
      .field("input_name", &self.input_name)
      .field("logits_output", &self.logits_output)
      .field("boxes_output", &self.boxes_output)
      .field("labels", &self.labels.len())
      .field("threshold", &self.threshold)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone)]
pub struct YolosBuilder {
  model_path: PathBuf,
  labels_path: Option<PathBuf>,
  threads: usize,
  threshold: f32,
}

impl FromUrlWithScheme for YolosBuilder {
  const SCHEME: &'static str = "yolos";
}

impl FromUrl for YolosBuilder {
  type Error = YolosError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YolosError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = YolosBuilder {
      model_path: PathBuf::from(url.path()),
      labels_path: None,
      threads: YOLOS_DEFAULT_THREADS,
      threshold: YOLOS_DEFAULT_THRESHOLD,
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "labels" => builder.labels_path = Some(PathBuf::from(value.as_ref())),
        "threads" => {
          builder.threads = value
            .parse()
            .map_err(|_| YolosError::ModelPathError(format!("无效的线程数: {}", value)))?;
        }
        _ => debug!("忽略未知的模型参数: {}={}", key, value),
      }
    }

    Ok(builder)
  }
}

impl YolosBuilder {
  pub fn threshold(mut self, threshold: f32) -> Result<Self, YolosError> {
    self.threshold = check_confidence_threshold(threshold)?;
    Ok(self)
  }

  pub fn build(self) -> Result<Yolos, YolosError> {
    if !self.model_path.exists() {
      return Err(YolosError::ModelPathError(format!(
        "模型文件不存在: {}",
        self.model_path.display()
      )));
    }

    let labels = match &self.labels_path {
      Some(path) => {
        info!("加载标签表: {}", path.display());
        LabelTable::from_file(path)?
      }
      None => LabelTable::fashionpedia(),
    };

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .map_err(YolosError::ort("创建会话"))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(YolosError::ort("设置优化级别"))?
      .with_intra_threads(self.threads)
      .map_err(YolosError::ort("设置线程数"))?
      .commit_from_file(&self.model_path)
      .map_err(YolosError::ort("加载模型"))?;
    info!("模型加载完成");

    if session.inputs.len() != YOLOS_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLOS_NUM_INPUTS,
        session.inputs.len()
      );
      return Err(YolosError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLOS_NUM_INPUTS,
        session.inputs.len()
      )));
    }
    if session.outputs.len() < 2 {
      return Err(YolosError::ModelInvalid(format!(
        "预期模型至少有 2 个输出, 实际为 {}",
        session.outputs.len()
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    let pick = |expected: &str, fallback: usize| {
      output_names
        .iter()
        .find(|name| name.as_str() == expected)
        .cloned()
        .unwrap_or_else(|| output_names[fallback].clone())
    };
    let logits_output = pick(YOLOS_LOGITS_OUTPUT, 0);
    let boxes_output = pick(YOLOS_BOXES_OUTPUT, 1);

    debug!("模型输入: {}", input_name);
    debug!("模型输出: {} / {}", logits_output, boxes_output);

    Ok(Yolos {
      session: Mutex::new(session),
      input_name,
      logits_output,
      boxes_output,
      labels,
      threshold: self.threshold,
    })
  }
}

/// 计算保持宽高比的缩放尺寸 (宽, 高)
///
/// 短边缩放到 800，若长边因此超过 1333，则改为按长边 1333 缩放；
/// 受限时长边由未取整的短边推得。两边最后都向下取整到 16 的倍数。
pub fn resize_dimensions(width: u32, height: u32) -> (u32, u32) {
  let short = width.min(height) as f64;
  let long = width.max(height) as f64;

  let mut size = YOLOS_SHORTEST_EDGE;
  let mut raw_size = size as f64;
  if long / short * size as f64 > YOLOS_LONGEST_EDGE as f64 {
    raw_size = YOLOS_LONGEST_EDGE as f64 * short / long;
    size = raw_size.round() as u32;
  }

  let (w, h) = if width < height {
    (size, (raw_size * height as f64 / width as f64) as u32)
  } else if width.min(height) == size {
    (width, height)
  } else {
    ((raw_size * width as f64 / height as f64) as u32, size)
  };

  // 极端宽高比下避免取整为 0
  let align = |v: u32| (v - v % YOLOS_SIZE_DIVISOR).max(YOLOS_SIZE_DIVISOR);
  (align(w), align(h))
}

/// 缩放并归一化为 NCHW 张量
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
  let (width, height) = resize_dimensions(image.width(), image.height());
  let resized = imageops::resize(image, width, height, FilterType::Triangle);

  let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
  for (x, y, pixel) in resized.enumerate_pixels() {
    for c in 0..3 {
      tensor[[0, c, y as usize, x as usize]] =
        (pixel[c] as f32 / 255.0 - YOLOS_IMAGE_MEAN[c]) / YOLOS_IMAGE_STD[c];
    }
  }
  tensor
}

/// softmax 后去掉最后的“无目标”类别，返回 (类别, 概率)
fn best_class(logits: ArrayView1<f32>) -> (u32, f32) {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let denom: f32 = logits.iter().map(|l| (l - max).exp()).sum();

  let (class_id, best) = logits
    .iter()
    .take(logits.len() - 1)
    .enumerate()
    .fold((0usize, f32::NEG_INFINITY), |acc, (i, &l)| {
      if l > acc.1 { (i, l) } else { acc }
    });

  (class_id as u32, (best - max).exp() / denom)
}

/// 将模型输出转为检测结果
///
/// `logits` 形状为 `[queries, classes + 1]`，`boxes` 形状为 `[queries, 4]`，
/// 边框为归一化的 (cx, cy, w, h)，输出按 `target` (宽, 高) 缩放到原图像素坐标。
pub fn postprocess(
  logits: ArrayView2<f32>,
  boxes: ArrayView2<f32>,
  target: (u32, u32),
  threshold: f32,
  labels: &LabelTable,
) -> Result<DetectResult<GarmentLabel>, YolosError> {
  if logits.nrows() != boxes.nrows() {
    return Err(YolosError::ShapeError(format!(
      "分类输出有 {} 个查询, 边框输出有 {} 个查询",
      logits.nrows(),
      boxes.nrows()
    )));
  }
  if boxes.ncols() != 4 {
    return Err(YolosError::ShapeError(format!(
      "边框输出的最后一维应为 4, 实际为 {}",
      boxes.ncols()
    )));
  }
  if logits.ncols() < 2 {
    return Err(YolosError::ShapeError(format!(
      "分类输出至少需要 2 个类别, 实际为 {}",
      logits.ncols()
    )));
  }

  let (width, height) = (target.0 as f32, target.1 as f32);
  let mut items = Vec::new();

  for (row, bbox) in logits.outer_iter().zip(boxes.outer_iter()) {
    let (class_id, score) = best_class(row);
    if score <= threshold {
      continue;
    }

    let (cx, cy) = (bbox[0], bbox[1]);
    let (w, h) = (bbox[2].max(0.0), bbox[3].max(0.0));

    items.push(DetectItem {
      kind: labels.get(class_id),
      score,
      bbox: [
        (cx - 0.5 * w) * width,
        (cy - 0.5 * h) * height,
        (cx + 0.5 * w) * width,
        (cy + 0.5 * h) * height,
      ],
    });
  }

  debug!("检测到 {} 个物体", items.len());
  debug!("检测结果: {:?}", items);

  Ok(items.into())
}

/// 取出批次中的第一张结果
fn first_in_batch<'a>(
  array: ArrayViewD<'a, f32>,
  name: &str,
) -> Result<ArrayView2<'a, f32>, YolosError> {
  let array = array
    .into_dimensionality::<Ix3>()
    .map_err(|e| YolosError::ShapeError(format!("输出 {} 应为三维张量: {}", name, e)))?;
  if array.len_of(Axis(0)) == 0 {
    return Err(YolosError::ShapeError(format!("输出 {} 的批次为空", name)));
  }
  Ok(array.index_axis_move(Axis(0), 0))
}

impl Model for Yolos {
  type Input = RgbImage;
  type Output = DetectResult<GarmentLabel>;
  type Error = YolosError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
      return Err(YolosError::EmptyImage);
    }

    debug!("预处理输入图像 {}x{}", width, height);
    let tensor = preprocess(input);
    debug!("模型输入形状: {:?}", tensor.shape());
    let value = Tensor::from_array(tensor).map_err(YolosError::ort("创建输入张量"))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| YolosError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => value])
      .map_err(YolosError::ort("推理"))?;

    let logits = outputs[self.logits_output.as_str()]
      .try_extract_array::<f32>()
      .map_err(YolosError::ort("提取分类输出"))?;
    let boxes = outputs[self.boxes_output.as_str()]
      .try_extract_array::<f32>()
      .map_err(YolosError::ort("提取边框输出"))?;

    postprocess(
      first_in_batch(logits, &self.logits_output)?,
      first_in_batch(boxes, &self.boxes_output)?,
      (width, height),
      self.threshold,
      &self.labels,
    )
  }
}
