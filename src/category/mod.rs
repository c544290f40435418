//! Categories and subcategories that transaction allocations point at.

mod core;
mod counts;
mod endpoints;

pub use core::{
    Category, CategoryId, Subcategory, SubcategoryId, create_category, create_category_table,
    create_subcategory, create_subcategory_table, delete_category, delete_subcategory,
    get_categories, get_subcategory, update_category, update_subcategory,
};
pub(crate) use core::check_category_pair;
pub use counts::get_category_transaction_counts_endpoint;
pub use endpoints::{
    CategoryState, create_category_endpoint, create_subcategory_endpoint,
    delete_category_endpoint, delete_subcategory_endpoint, list_categories_endpoint,
    update_category_endpoint, update_subcategory_endpoint,
};
