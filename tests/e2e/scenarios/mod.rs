mod aggregate;
mod failures;
mod happy_path;
mod harness_reuse;
