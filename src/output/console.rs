// 该文件是 CodeFit 项目的一部分。
// src/output/console.rs - 终端输出
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

use std::{collections::BTreeSet, convert::Infallible};

use image::RgbImage;

use crate::{
  compliance::{Inspection, Verdict, Vocabulary},
  model::WithLabel,
  output::Render,
};

/// 在标准输出打印检测到的服装与结论
#[derive(Debug, Default)]
pub struct ConsoleOutput;

fn join(items: &BTreeSet<String>) -> String {
  items.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub fn banner(vocabulary: &Vocabulary) -> String {
  format!(
    "Welcome to CodeFit\nDress Code Compliance Checker\nAllowed: {}\nProhibited: {}",
    join(vocabulary.allowed()),
    join(vocabulary.prohibited())
  )
}

pub fn verdict_message(verdict: &Verdict) -> String {
  if verdict.compliant {
    "Outfit is compliant with the dress code!".to_string()
  } else {
    format!("Prohibited items detected: {}", join(&verdict.violations))
  }
}

impl<T: WithLabel> Render<RgbImage, Inspection<T>> for ConsoleOutput {
  type Error = Infallible;

  fn render_result(&self, _frame: &RgbImage, result: &Inspection<T>) -> Result<(), Self::Error> {
    println!("Detected clothing items: {}", join(&result.verdict.detected_items));
    for tagged in &result.detections {
      println!(
        "  - {} ({}%) [{}]",
        tagged.item.kind.label(),
        tagged.item.confidence_percent(),
        tagged.tag.as_str()
      );
    }
    println!("{}", verdict_message(&result.verdict));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn banner_lists_both_vocabularies() {
    let text = banner(&Vocabulary::new(["Dress", "Pants"], ["Shorts"]).unwrap());
    assert!(text.contains("Allowed: Dress, Pants"));
    assert!(text.contains("Prohibited: Shorts"));
  }

  #[test]
  fn compliant_message() {
    let verdict = Verdict {
      detected_items: BTreeSet::from(["Pants".to_string()]),
      violations: BTreeSet::new(),
      compliant: true,
    };
    assert_eq!(verdict_message(&verdict), "Outfit is compliant with the dress code!");
  }

  #[test]
  fn violation_message_lists_categories() {
    let violations = BTreeSet::from(["T-shirt".to_string(), "Shorts".to_string()]);
    let verdict = Verdict {
      detected_items: violations.clone(),
      violations,
      compliant: false,
    };
    assert_eq!(
      verdict_message(&verdict),
      "Prohibited items detected: Shorts, T-shirt"
    );
  }
}
