pub mod datetime;
pub mod error;
pub mod scheduled_executor;
pub mod string_ext;
pub mod text;

pub use datetime::{format_datetime, now_naive, parse_datetime, parse_db_datetime};
pub use error::{ApiError, ApiResult};
pub use scheduled_executor::{ScheduledExecutor, ScheduledTask};
pub use string_ext::{StringExt, clean_optional_string};
