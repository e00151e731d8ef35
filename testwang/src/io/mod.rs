//! I/O helpers: the test list, config, runner process and report files.

pub mod config;
pub mod cycle;
pub mod process;
pub mod report_file;
pub mod report_json;
pub mod resolve;
pub mod test_list;
