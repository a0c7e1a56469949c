
mod sample_path_tests;
