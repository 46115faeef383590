pub mod test_runner;
pub mod writer;
