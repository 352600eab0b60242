pub mod position_size;
pub mod price;
