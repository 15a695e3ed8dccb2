pub mod health;
pub mod photo_upload;
