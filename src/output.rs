// 该文件是 CodeFit 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;

use crate::compliance::Inspection;
use crate::model::WithLabel;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

impl<F, D, R: Render<F, D>> Render<F, D> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod console;
pub use self::console::{ConsoleOutput, banner, verdict_message};

mod report;
pub use self::report::{Report, ReportDetection, ReportError, ReportOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("报告输出错误: {0}")]
  ReportError(#[from] ReportError),
}

pub enum OutputWrapper {
  Console(ConsoleOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  Report(ReportOutput),
}

impl<T: WithLabel> Render<RgbImage, Inspection<T>> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &Inspection<T>) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => output
        .render_result(frame, result)
        .map_err(|never| match never {}),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::Report(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
