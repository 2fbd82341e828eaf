pub mod report;

pub use report::print_report;
