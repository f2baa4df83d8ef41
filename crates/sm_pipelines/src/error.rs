use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("slide entry not found in archive: {0}")]
    SlideNotFound(String),

    #[error("office conversion failed: {0}")]
    ConvertFailed(String),

    #[error("office conversion timed out after {0}s")]
    ConvertTimeout(u64),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("onnx runtime error: {0}")]
    Onnx(String),

    #[error("pdf rendering error: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
