#![cfg(feature = "save_image_file")]

use std::collections::BTreeSet;

use image::{Rgb, RgbImage};
use thiserror::Error;

use codefit::{
  compliance::Vocabulary,
  input::{ImageFileInput, ImageFileInputError},
  model::{DetectItem, DetectResult, GarmentLabel, Model},
  output::{OutputWrapper, ReportOutput, SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, Task, inspect},
};

#[derive(Error, Debug)]
#[error("detector unavailable")]
struct DetectorDown;

/// 按固定结果返回的检测器
struct FixedDetector {
  items: Vec<DetectItem<GarmentLabel>>,
}

impl Model for FixedDetector {
  type Input = RgbImage;
  type Output = DetectResult<GarmentLabel>;
  type Error = DetectorDown;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(self.items.clone().into())
  }
}

struct BrokenDetector;

impl Model for BrokenDetector {
  type Input = RgbImage;
  type Output = DetectResult<GarmentLabel>;
  type Error = DetectorDown;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(DetectorDown)
  }
}

fn write_outfit(dir: &std::path::Path) -> std::path::PathBuf {
  let path = dir.join("outfit.png");
  RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]))
    .save(&path)
    .unwrap();
  path
}

#[test]
fn annotates_and_reports_a_non_compliant_outfit() {
  let dir = tempfile::tempdir().unwrap();
  let input = ImageFileInput::open(write_outfit(dir.path())).unwrap();
  let source = input.source().to_string();

  let annotated = dir.path().join("out").join("annotated.png");
  let report = dir.path().join("report.json");
  let outputs = vec![
    OutputWrapper::SaveImageFileOutput(
      SaveImageFileOutput::new(&annotated).with_draw(Draw::without_font()),
    ),
    OutputWrapper::Report(ReportOutput::new(&report, source)),
  ];

  let detector = FixedDetector {
    items: vec![
      DetectItem::new(GarmentLabel::new(10, "Dress"), 0.7, [4.0, 4.0, 30.0, 60.0]),
      DetectItem::new(GarmentLabel::new(7, "Shorts"), 0.6, [34.0, 4.0, 60.0, 60.0]),
    ],
  };

  let verdict = OneShotTask::new(Vocabulary::default(), 0.5)
    .unwrap()
    .run_task(input, &detector, &outputs)
    .unwrap();
  assert!(!verdict.compliant);
  assert_eq!(
    verdict.violations,
    BTreeSet::from(["Shorts".to_string()])
  );

  let image = image::open(&annotated).unwrap().to_rgb8();
  assert_eq!(image.get_pixel(4, 30), &Rgb([0, 128, 0]));
  assert_eq!(image.get_pixel(34, 30), &Rgb([255, 0, 0]));
  assert_eq!(image.get_pixel(20, 30), &Rgb([0, 0, 0]));

  let json: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
  assert!(json["source"].as_str().unwrap().ends_with("outfit.png"));
  assert_eq!(json["confidence_threshold"], 0.5);
  assert_eq!(json["detections"].as_array().unwrap().len(), 2);
  assert_eq!(json["verdict"]["detected_items"][0], "Dress");
  assert_eq!(json["verdict"]["compliant"], false);
}

#[test]
fn detector_failure_produces_no_outputs() {
  let dir = tempfile::tempdir().unwrap();
  let input = ImageFileInput::open(write_outfit(dir.path())).unwrap();
  let report = dir.path().join("report.json");
  let outputs = vec![OutputWrapper::Report(ReportOutput::new(&report, "outfit.png"))];

  let result = OneShotTask::new(Vocabulary::default(), 0.5)
    .unwrap()
    .run_task(input, &BrokenDetector, &outputs);

  let err = result.unwrap_err();
  assert!(err.to_string().contains("detector unavailable"));
  assert!(!report.exists());
}

#[test]
fn corrupt_upload_fails_before_detection() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("corrupt.jpg");
  std::fs::write(&path, b"\xff\xd8\xff not really a jpeg").unwrap();

  assert!(matches!(
    ImageFileInput::open(&path),
    Err(ImageFileInputError::ImageLoadError(_))
  ));
}

#[test]
fn inspect_reuses_the_same_detector() {
  let detector = FixedDetector {
    items: vec![DetectItem::new(
      GarmentLabel::new(23, "Sneakers"),
      0.9,
      [0.0, 0.0, 8.0, 8.0],
    )],
  };
  let frame = RgbImage::new(16, 16);
  let vocabulary = Vocabulary::default();

  let first = inspect(&detector, &frame, &vocabulary, 0.5).unwrap();
  let second = inspect(&detector, &frame, &vocabulary, 0.5).unwrap();
  assert_eq!(first.verdict, second.verdict);
  assert!(first.verdict.compliant);
}

#[test]
fn nan_threshold_never_yields_a_verdict() {
  let dir = tempfile::tempdir().unwrap();
  let input = ImageFileInput::open(write_outfit(dir.path())).unwrap();
  let report = dir.path().join("report.json");
  let outputs = vec![OutputWrapper::Report(ReportOutput::new(&report, "outfit.png"))];
  let detector = FixedDetector {
    items: vec![DetectItem::new(
      GarmentLabel::new(1, "T-shirt"),
      0.95,
      [0.0, 0.0, 8.0, 8.0],
    )],
  };

  let task = OneShotTask::new(Vocabulary::default(), f32::NAN);
  assert!(task.is_err());

  let verdict = OneShotTask::new(Vocabulary::default(), 0.5)
    .unwrap()
    .run_task(input, &detector, &outputs)
    .unwrap();
  assert!(!verdict.compliant);
}
