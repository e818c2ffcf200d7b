mod common;

mod concurrency_tests;
mod descriptor_tests;
mod provision_tests;
