// 该文件是 CodeFit 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use codefit::{
  FromUrl,
  compliance::Vocabulary,
  input::ImageFileInput,
  model::YolosBuilder,
  output::{ConsoleOutput, OutputWrapper, ReportOutput, SaveImageFileOutput, banner, draw::Draw},
  task::{OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("置信度阈值: {}", args.confidence);

  let vocabulary = match &args.vocabulary {
    Some(path) => {
      info!("加载词表: {}", path.display());
      Vocabulary::from_file(path)?
    }
    None => Vocabulary::default(),
  };
  println!("{}", banner(&vocabulary));
  println!();

  let input = ImageFileInput::from_url(&args.input)?;
  let source = input.source().to_string();

  info!("正在加载模型...");
  let model = YolosBuilder::from_url(&args.model)?
    .threshold(args.confidence)?
    .build()?;
  debug!("{:?}", model);

  let mut outputs = vec![OutputWrapper::Console(ConsoleOutput)];
  if let Some(url) = &args.output {
    let draw = match &args.font {
      Some(path) => Draw::with_font_file(path)?,
      None => Draw::system(),
    };
    let output = SaveImageFileOutput::from_url(url)?.with_draw(draw);
    outputs.push(OutputWrapper::SaveImageFileOutput(output));
  }
  if let Some(path) = &args.report {
    outputs.push(OutputWrapper::Report(ReportOutput::new(path, source)));
  }

  let verdict = OneShotTask::new(vocabulary, args.confidence)?.run_task(input, &model, &outputs)?;
  info!(
    "检查完成: {}",
    if verdict.compliant { "合规" } else { "不合规" }
  );

  Ok(())
}
