pub mod indicator;
pub mod news;
pub mod price;
pub(crate) mod time;
