pub mod db_utils;
pub mod error;
pub mod hierarchy;
pub mod i18n;
pub mod scope;
