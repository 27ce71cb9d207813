pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, error, header, import_report, info, muted, section, success, summary_row, timing, warn,
    warning_list,
};
pub use progress::Spinner;
pub use table::{records_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
