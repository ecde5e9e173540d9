//! Integration tests for the varsum binary.
//!
//! These tests validate end-to-end workflows through the CLI, ensuring the
//! commands compose over a shared summary store.

mod helpers;
mod test_end_to_end;
mod test_error_paths;
mod test_find_duplicates_command;
mod test_summarize_command;
