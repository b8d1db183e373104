pub mod agenda;
pub mod attendance;
pub mod committee_form;
pub mod committee_registration;
pub mod user;
