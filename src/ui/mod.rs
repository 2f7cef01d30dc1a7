//! Terminal presentation for the `rolodex` binary

pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, is_quiet, status_badge, success, warn};
pub use table::{contacts_table, profiles_table, stats_table};
pub use theme::{theme, Theme};
