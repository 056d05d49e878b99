//! Categories and subcategories label transactions, e.g. 'Eating Out' > 'Coffee'.

mod db;
mod endpoints;

pub use db::{
    CategoryId, CategoryKind, SubcategoryId, create_category, create_category_tables,
    create_subcategory, get_category, get_subcategory,
};
pub use endpoints::{
    create_category_endpoint, create_subcategory_endpoint, delete_category_endpoint,
    delete_subcategory_endpoint, list_categories_endpoint, list_subcategories_endpoint,
    update_category_endpoint, update_subcategory_endpoint,
};
