//! Integration tests for the fmf metadata tree library and CLI

mod adjust_rules;
mod cli_commands;
mod query_filter;
mod round_trip;
mod test_utils;
mod tree_building;
