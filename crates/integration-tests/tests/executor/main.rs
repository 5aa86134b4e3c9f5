//! End-to-end tests of the multi-stage executor against the mock
//! JSON-expression backend.

mod abstract_types;
mod arguments;
mod errors;
mod fragments;
mod middleware;
mod scenarios;
