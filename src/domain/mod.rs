pub mod change;
pub mod chunk;
pub mod commit;
pub mod filter;
