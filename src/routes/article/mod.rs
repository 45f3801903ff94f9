mod handler;
pub mod model;

pub use handler::{
    create_article,
    delete_article,
    get_article,
    list_articles,
    update_article,
};
