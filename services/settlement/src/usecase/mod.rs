pub mod bonus;
pub mod cancel;
pub mod compensation;
pub mod confirm;
pub mod prepare;
