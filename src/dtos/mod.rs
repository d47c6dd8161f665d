pub mod marketdtos;
pub mod userdtos;
