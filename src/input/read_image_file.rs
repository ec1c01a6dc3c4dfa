// 该文件是 Shanan （山南西风） 项目的一部分。
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

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameError, RgbNhwcFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

/// 单张图像输入，读取后缩放到模型输入尺寸 `W`x`H`
pub struct ImageFileInput<const W: u32, const H: u32> {
  image: Option<RgbImage>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
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

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    debug!(
      "读取图像 {}: {}x{}",
      path,
      image.width(),
      image.height()
    );

    Ok(ImageFileInput { image: Some(image) })
  }
}

impl<const W: u32, const H: u32> From<RgbImage> for ImageFileInput<W, H> {
  fn from(image: RgbImage) -> Self {
    ImageFileInput { image: Some(image) }
  }
}

impl<const W: u32, const H: u32> ImageFileInput<W, H> {
  pub fn into_nhwc(self) -> ImageFileInputNhwc<W, H> {
    ImageFileInputNhwc { inner: self }
  }
}

pub struct ImageFileInputNhwc<const W: u32, const H: u32> {
  inner: ImageFileInput<W, H>,
}

impl<const W: u32, const H: u32> Iterator for ImageFileInputNhwc<W, H> {
  type Item = RgbNhwcFrame<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    let image = self.inner.image.take()?;
    // 缩放后长度恒为 3*W*H，转换不会失败
    match to_nhwc_frame(image) {
      Ok(frame) => Some(frame),
      Err(e) => {
        debug_assert!(false, "图像转换失败: {}", e);
        error!("图像转换失败: {}", e);
        None
      }
    }
  }
}

/// 双线性缩放到 `W`x`H`，RgbImage 的内存布局本身即为 HWC
pub fn to_nhwc_frame<const W: u32, const H: u32>(
  image: RgbImage,
) -> Result<RgbNhwcFrame<W, H>, ImageFileInputError> {
  let resized = if image.dimensions() == (W, H) {
    image
  } else {
    image::imageops::resize(&image, W, H, FilterType::Triangle)
  };

  Ok(RgbNhwcFrame::try_from(resized.into_raw())?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::AsNhwcFrame;
  use image::Rgb;

  #[test]
  fn resizes_to_model_shape() {
    let image = RgbImage::from_pixel(10, 6, Rgb([10, 20, 30]));
    let mut frames = ImageFileInput::<4, 4>::from(image).into_nhwc();

    let frame = frames.next().unwrap();
    assert_eq!(frame.as_nhwc().len(), 4 * 4 * 3);
    assert_eq!(&frame.as_nhwc()[..3], &[10, 20, 30]);
    assert!(frames.next().is_none());
  }

  #[test]
  fn keeps_channels_interleaved() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([1, 2, 3]));
    image.put_pixel(1, 0, Rgb([4, 5, 6]));

    let frame = to_nhwc_frame::<2, 1>(image).unwrap();
    assert_eq!(frame.as_nhwc(), &[1, 2, 3, 4, 5, 6]);
  }

  #[test]
  fn any_source_size_converts() {
    for (w, h) in [(1, 1), (5, 3), (3, 5), (640, 480)] {
      let image = RgbImage::from_pixel(w, h, Rgb([9, 8, 7]));
      let frame = ImageFileInput::<7, 5>::from(image)
        .into_nhwc()
        .next()
        .unwrap();
      assert_eq!(frame.as_nhwc().len(), 7 * 5 * 3);
    }
  }

  #[test]
  fn reads_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cat.png");
    RgbImage::from_pixel(3, 3, Rgb([200, 100, 50]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let frame = ImageFileInput::<3, 3>::from_url(&url)
      .unwrap()
      .into_nhwc()
      .next()
      .unwrap();
    assert_eq!(&frame.as_nhwc()[..3], &[200, 100, 50]);
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("file:///tmp/cat.png").unwrap();
    assert!(matches!(
      ImageFileInput::<3, 3>::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }
}
