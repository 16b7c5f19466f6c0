#![cfg(test)]

pub mod common;
pub mod plugin_flow_tests;
pub mod scenario_tests;
