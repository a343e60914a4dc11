pub mod budget;
pub mod inventory;
pub mod report;
pub mod window;
