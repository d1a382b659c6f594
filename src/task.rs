// 该文件是 CodeFit 项目的一部分。
// src/task.rs - 检测与判定任务
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

use tracing::{info, warn};

use crate::{
  compliance::{Inspection, ThresholdError, Verdict, Vocabulary, check_confidence_threshold},
  model::{DetectResult, Model, WithLabel},
  output::Render,
};

/// 对单帧执行检测并得出结论
///
/// 检测器由调用方构造并以引用传入；推理失败时直接返回错误，不会产生结论。
pub fn inspect<F, T, M>(
  model: &M,
  frame: &F,
  vocabulary: &Vocabulary,
  confidence_threshold: f32,
) -> Result<Inspection<T>, M::Error>
where
  T: WithLabel,
  M: Model<Input = F, Output = DetectResult<T>>,
{
  let result = model.infer(frame)?;
  let inspection = Inspection::new(result, vocabulary, confidence_threshold);

  for label in vocabulary.unknown_items(&inspection.verdict) {
    warn!("检测到未登记在词表中的类别: {}", label);
  }

  Ok(inspection)
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: &M, output: &O) -> Result<Verdict, Self::Error>;
}

pub struct OneShotTask {
  vocabulary: Vocabulary,
  confidence_threshold: f32,
}

impl OneShotTask {
  /// 阈值须为 [0, 1] 内的有限值，否则拒绝构造任务
  pub fn new(vocabulary: Vocabulary, confidence_threshold: f32) -> Result<Self, ThresholdError> {
    Ok(Self {
      vocabulary,
      confidence_threshold: check_confidence_threshold(confidence_threshold)?,
    })
  }
}

impl<
  F,
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult<T>, Error = ME>,
  O: Render<F, Inspection<T>, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &M, output: &O) -> Result<Verdict, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始推理...");
    let now = std::time::Instant::now();
    let inspection = inspect(model, &frame, &self.vocabulary, self.confidence_threshold)?;
    info!(
      "推理完成，耗时: {:.2?}，检测到 {} 个物体",
      now.elapsed(),
      inspection.detections.len()
    );
    output.render_result(&frame, &inspection)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(inspection.verdict)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectItem, GarmentLabel};
  use std::cell::RefCell;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("stub failure")]
  struct StubError;

  struct StubModel {
    items: Vec<DetectItem<GarmentLabel>>,
    fail: bool,
  }

  impl Model for StubModel {
    type Input = u8;
    type Output = DetectResult<GarmentLabel>;
    type Error = StubError;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      if self.fail {
        return Err(StubError);
      }
      Ok(self.items.clone().into())
    }
  }

  #[derive(Default)]
  struct Recorder {
    seen: RefCell<Vec<Verdict>>,
  }

  impl Render<u8, Inspection<GarmentLabel>> for Recorder {
    type Error = StubError;

    fn render_result(&self, _frame: &u8, result: &Inspection<GarmentLabel>) -> Result<(), StubError> {
      self.seen.borrow_mut().push(result.verdict.clone());
      Ok(())
    }
  }

  fn model(labels: &[(&str, f32)], fail: bool) -> StubModel {
    StubModel {
      items: labels
        .iter()
        .map(|(label, score)| {
          DetectItem::new(GarmentLabel::new(0, *label), *score, [0.0, 0.0, 1.0, 1.0])
        })
        .collect(),
      fail,
    }
  }

  #[test]
  fn one_shot_renders_verdict() {
    let recorder = Recorder::default();
    let verdict = OneShotTask::new(Vocabulary::default(), 0.5)
      .unwrap()
      .run_task(std::iter::once(0u8), &model(&[("T-shirt", 0.95)], false), &recorder)
      .unwrap();

    assert!(!verdict.compliant);
    assert_eq!(recorder.seen.borrow().as_slice(), &[verdict]);
  }

  #[test]
  fn detector_failure_skips_rendering() {
    let recorder = Recorder::default();
    let result = OneShotTask::new(Vocabulary::default(), 0.5).unwrap().run_task(
      std::iter::once(0u8),
      &model(&[("Pants", 0.9)], true),
      &recorder,
    );

    assert!(result.is_err());
    assert!(recorder.seen.borrow().is_empty());
  }

  #[test]
  fn missing_frame_is_an_error() {
    let recorder = Recorder::default();
    let result = OneShotTask::new(Vocabulary::default(), 0.5).unwrap().run_task(
      std::iter::empty::<u8>(),
      &model(&[], false),
      &recorder,
    );
    assert!(result.is_err());
  }

  #[test]
  fn invalid_threshold_is_rejected_before_running() {
    for bad in [f32::NAN, -0.5, 2.0] {
      assert!(OneShotTask::new(Vocabulary::default(), bad).is_err());
    }
    assert!(OneShotTask::new(Vocabulary::default(), 0.0).is_ok());
    assert!(OneShotTask::new(Vocabulary::default(), 1.0).is_ok());
  }

  #[test]
  fn inspect_keeps_unknown_labels_compliant() {
    let inspection = inspect(&model(&[("Hat", 0.99)], false), &0u8, &Vocabulary::default(), 0.5)
      .unwrap();
    assert!(inspection.verdict.compliant);
    assert!(inspection.verdict.detected_items.contains("Hat"));
  }
}
