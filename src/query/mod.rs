//! Query construction - join discovery, filters and statement synthesis

pub mod builder;
pub mod filter;
pub mod join;
pub mod path;

pub use builder::{SqlBuilder, Statement};
pub use filter::{Criterion, FieldTarget, Filter, FilterValue, TableFilter};
pub use join::{build_join, JoinClause, JoinPlan};
pub use path::{find_path, JoinPath, DEFAULT_MAX_DEPTH};
