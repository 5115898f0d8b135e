pub mod move_vec;
pub mod singleton;
pub mod vec;
