// 该文件是 CodeFit 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use codefit::compliance::check_confidence_threshold;
use url::Url;

/// CodeFit 着装规范检查
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型（ONNX）
  /// 例如: yolos:///models/yolos-fashionpedia.onnx?labels=/path/labels.toml&threads=4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入图像，例如 image:///photos/outfit.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 标注图像输出路径，例如 image:///tmp/outfit-annotated.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// 着装规范词表（TOML），缺省使用内置词表
  #[arg(long, value_name = "FILE")]
  pub vocabulary: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD", value_parser = parse_confidence)]
  pub confidence: f32,

  /// 标签字体文件（TTF/OTF），缺省尝试系统字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// JSON 检测报告输出路径
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
}

fn parse_confidence(value: &str) -> Result<f32, String> {
  let threshold: f32 = value
    .parse()
    .map_err(|e| format!("无效的置信度阈值 {}: {}", value, e))?;
  check_confidence_threshold(threshold).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(confidence: &str) -> Result<Args, clap::Error> {
    Args::try_parse_from([
      "codefit",
      "--model",
      "yolos:///models/fashion.onnx",
      "--input",
      "image:///photos/outfit.jpg",
      "--confidence",
      confidence,
    ])
  }

  #[test]
  fn confidence_defaults_to_half() {
    let args = Args::try_parse_from([
      "codefit",
      "--model",
      "yolos:///models/fashion.onnx",
      "--input",
      "image:///photos/outfit.jpg",
    ])
    .unwrap();
    assert_eq!(args.confidence, 0.5);
  }

  #[test]
  fn confidence_accepts_the_closed_unit_interval() {
    assert_eq!(parse("0").unwrap().confidence, 0.0);
    assert_eq!(parse("0.75").unwrap().confidence, 0.75);
    assert_eq!(parse("1").unwrap().confidence, 1.0);
  }

  #[test]
  fn confidence_rejects_nan_and_out_of_range_values() {
    for bad in ["NaN", "inf", "-0.1", "1.5", "high"] {
      assert!(parse(bad).is_err(), "{bad} should be rejected");
    }
  }
}
