mod handler;
mod model;

pub use handler::{delete_image, upload_image};
