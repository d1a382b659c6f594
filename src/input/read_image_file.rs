// 该文件是 CodeFit 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图像输入，迭代一次后耗尽
pub struct ImageFileInput {
  source: String,
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(ImageFileInput {
      source: path.display().to_string(),
      image: Some(image),
    })
  }

  /// 从内存中的编码数据（如上传的文件）解码
  pub fn from_bytes(source: impl Into<String>, bytes: &[u8]) -> Result<Self, ImageFileInputError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    Ok(ImageFileInput {
      source: source.into(),
      image: Some(image),
    })
  }

  pub fn source(&self) -> &str {
    &self.source
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
    let mut bytes = Vec::new();
    image
      .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
      .unwrap();
    bytes
  }

  #[test]
  fn decodes_from_memory_once() {
    let mut input = ImageFileInput::from_bytes("upload.png", &png_bytes()).unwrap();
    assert_eq!(input.source(), "upload.png");

    let frame = input.next().unwrap();
    assert_eq!(frame.dimensions(), (4, 3));
    assert_eq!(frame.get_pixel(0, 0), &image::Rgb([10, 20, 30]));
    assert!(input.next().is_none());
  }

  #[test]
  fn corrupt_bytes_fail_to_decode() {
    let result = ImageFileInput::from_bytes("broken.png", b"definitely not an image");
    assert!(matches!(result, Err(ImageFileInputError::ImageLoadError(_))));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("yolos:///tmp/outfit.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn missing_file_is_io_error() {
    let url = Url::parse("image:///definitely/not/here.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
