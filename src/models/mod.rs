pub mod chatmodel;
pub mod lifecycle;
pub mod marketmodel;
pub mod usermodel;
