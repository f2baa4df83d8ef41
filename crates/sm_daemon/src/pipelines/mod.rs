//! One module per pipeline stage, run in the fixed order the orchestrator
//! drives them in: text+bm25, text_vec, thumb, img_vec.

pub mod img_vec;
pub mod text_bm25;
pub mod text_vec;
pub mod thumb;
