mod handler;
pub mod model;

pub use handler::{
    create_platform,
    delete_platform,
    get_platform,
    list_platforms,
    update_platform,
};
