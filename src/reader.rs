pub mod counts;

pub use counts::CountTable;
