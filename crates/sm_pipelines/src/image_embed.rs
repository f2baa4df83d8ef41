//! Local ONNX image embedding: one-time model introspection, then
//! decode → resize → normalize → (transpose) → batch → run → pack.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{PipelineError, Result};
use crate::text_embed::pack_f32;

/// Introspected shape of the embedder's single input/output pair.
pub struct EmbedderInfo {
    pub input_name: String,
    pub output_name: String,
    pub width: u32,
    pub height: u32,
    pub channels_first: bool,
    pub model_id: String,
}

pub struct ImageEmbedder {
    session: Session,
    info: EmbedderInfo,
}

impl ImageEmbedder {
    /// Loads and introspects the model at `model_path`. Returns `Ok(None)`
    /// (never an error) when the asset is absent or its shape doesn't fit
    /// the permissive NCHW/NHWC contract — the caller treats either as
    /// "image embedding disabled for this job".
    pub fn load(model_path: &Path) -> Result<Option<ImageEmbedder>> {
        if !model_path.exists() {
            return Ok(None);
        }

        let session = Session::builder()
            .map_err(|e| PipelineError::Onnx(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Onnx(e.to_string()))?;

        let Some(input) = session.inputs.first() else {
            return Ok(None);
        };
        let Some(output) = session.outputs.first() else {
            return Ok(None);
        };

        let shape = match input.input_type.tensor_dimensions() {
            Some(dims) if dims.len() == 4 => dims.clone(),
            _ => return Ok(None),
        };

        let (channels_first, height, width) = if shape[1] == 3 {
            (true, dim_or(shape[2], 224), dim_or(shape[3], 224))
        } else if shape[3] == 3 {
            (false, dim_or(shape[1], 224), dim_or(shape[2], 224))
        } else {
            return Ok(None);
        };

        let info = EmbedderInfo {
            input_name: input.name.clone(),
            output_name: output.name.clone(),
            width,
            height,
            channels_first,
            model_id: format!(
                "onnx:{}",
                model_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
            ),
        };

        Ok(Some(ImageEmbedder { session, info }))
    }

    pub fn info(&self) -> &EmbedderInfo {
        &self.info
    }

    /// Runs inference over one thumbnail image, returning packed LE32 floats.
    pub fn embed_image(&mut self, image_path: &Path) -> Result<Vec<u8>> {
        let img = image::open(image_path)?.into_rgb8();
        let resized = image::imageops::resize(
            &img,
            self.info.width,
            self.info.height,
            FilterType::Lanczos3,
        );

        let mut arr = Array4::<f32>::zeros((1, self.info.height as usize, self.info.width as usize, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                arr[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }

        let input_tensor: Tensor<f32> = if self.info.channels_first {
            let transposed = arr.permuted_axes([0, 3, 1, 2]).as_standard_layout().to_owned();
            Tensor::from_array(transposed.into_dyn())
                .map_err(|e| PipelineError::Onnx(e.to_string()))?
        } else {
            Tensor::from_array(arr.into_dyn()).map_err(|e| PipelineError::Onnx(e.to_string()))?
        };

        let outputs = self
            .session
            .run(ort::inputs![self.info.input_name.as_str() => input_tensor])
            .map_err(|e| PipelineError::Onnx(e.to_string()))?;

        let output = outputs[self.info.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Onnx(e.to_string()))?;

        let flat: Vec<f32> = output.1.to_vec();
        Ok(pack_f32(&flat))
    }
}

fn dim_or(dim: i64, default: u32) -> u32 {
    if dim > 0 {
        dim as u32
    } else {
        default
    }
}

pub fn default_model_path(library_root: &Path) -> PathBuf {
    library_root.join("cache").join("image_embedder.onnx")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_disables_cleanly() {
        let result = ImageEmbedder::load(Path::new("/nonexistent/image_embedder.onnx")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn default_path_matches_convention() {
        let p = default_model_path(Path::new("/lib"));
        assert_eq!(p, Path::new("/lib/cache/image_embedder.onnx"));
    }
}
