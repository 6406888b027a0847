pub mod timezone;

pub use timezone::{display_stamp, now_in};
