pub mod check;
pub mod configure;
