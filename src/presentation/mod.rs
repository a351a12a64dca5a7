pub mod bundle;
pub mod display;

pub use bundle::{build_bundle, Bundle};
pub use display::{format_duration, format_file_size, print_file_list, WalkSummary};
