mod frame_test;
mod masking_test;
mod query_test;
