pub mod calendar;
pub mod campaigns;
pub mod composer;
pub mod fanout;
pub mod notice;
