pub mod attempt_service;
pub mod catalog_service;
pub mod grading_service;
pub mod identity_service;
pub mod question_service;
pub mod quiz_service;
pub mod quiz_setting_service;
pub mod runtime_service;
