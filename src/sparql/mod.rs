pub mod laborer;
