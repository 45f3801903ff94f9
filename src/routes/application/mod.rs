mod handler;
pub mod model;

pub use handler::{
    create_application,
    delete_application,
    get_application,
    list_applications,
    update_application,
};
