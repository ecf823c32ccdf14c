pub mod efficiency;
pub mod filling;
pub mod histogram1d;
