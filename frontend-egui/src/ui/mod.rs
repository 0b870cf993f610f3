pub mod confirm_dialog;
pub mod header;
pub mod log_panel;
pub mod process_table;
pub mod status_bar;
