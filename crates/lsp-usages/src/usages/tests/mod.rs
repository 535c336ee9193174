mod test_helpers;
mod tests_core_finder;
