use serde::Deserialize;

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
}
