mod engine_lifecycle_test;
