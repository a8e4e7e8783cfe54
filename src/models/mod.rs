pub mod answer_sheet;
pub mod catalog;
pub mod question;
pub mod quiz;
pub mod user;
