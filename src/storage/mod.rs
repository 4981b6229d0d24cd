pub mod bplus_tree;
pub mod btree;
pub mod index_tree;
pub mod pager;
pub mod schema;
pub mod storage_manager;
