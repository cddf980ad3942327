pub mod dedupe;
pub mod format;

pub use dedupe::{dedupe, duplicates_removed, Unique};
pub use format::{
    cell_text, format_phone, format_value, parse_date, plan_url, PhoneFormat, ValueFormat,
};
