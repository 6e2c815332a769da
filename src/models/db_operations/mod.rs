pub mod posts_db_operations;
pub mod site_db_operations;
