//! Wheelify: a vehicle rental marketplace. Customers book vehicles that
//! approved vendors list, pay through eSewa, and admins moderate vendors,
//! vehicles and the terms of service.
#[macro_use]
pub mod macros;

pub mod admin;
pub mod approval;
pub mod auth;
pub mod db_client;
pub mod error;
pub mod file_server;
pub mod payment_gateway;
pub mod rentals;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;
pub mod terms;
pub mod users;
pub mod vehicles;
pub mod vendors;
