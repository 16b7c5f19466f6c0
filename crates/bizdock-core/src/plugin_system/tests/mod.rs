#[cfg(test)]
mod store_tests;
