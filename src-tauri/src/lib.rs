mod backend;

pub use backend::run;
