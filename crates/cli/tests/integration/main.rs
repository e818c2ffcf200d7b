mod common;

mod env_tests;
mod resolve_tests;
mod shell_tests;
mod update_tests;
