pub mod geometry;
pub mod init;
pub mod platforms;
pub mod run;
pub mod select;
