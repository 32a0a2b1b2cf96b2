mod queue_tests;
mod storage_tests;
mod upload_validation_tests;
