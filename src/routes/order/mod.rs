mod handler;
pub mod model;

pub use handler::{delete_order, get_order, list_orders, update_order_status};
