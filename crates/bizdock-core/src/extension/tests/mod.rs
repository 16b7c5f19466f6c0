#[cfg(test)]
mod classes_tests;
#[cfg(test)]
mod descriptor_tests;
#[cfg(test)]
mod i18n_tests;
#[cfg(test)]
mod loader_tests;
