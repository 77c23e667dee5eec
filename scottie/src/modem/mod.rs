pub mod fsk;
pub mod sstv;
