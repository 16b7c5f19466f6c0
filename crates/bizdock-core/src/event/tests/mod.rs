// Event system test modules
#[cfg(test)]
mod message_tests;
#[cfg(test)]
mod supervisor_tests;
#[cfg(test)]
mod directory_tests;
