pub mod scan;
pub mod sync;

pub use scan::scan_command;
pub use sync::sync_command;
