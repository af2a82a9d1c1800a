mod trafmon_error;

pub use trafmon_error::TrafmonError;
pub type Result<T> = std::result::Result<T, TrafmonError>;
