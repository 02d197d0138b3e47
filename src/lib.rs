//! Core library for the sparql-laborer command line application.
//!
//! A query collection document describes one or more runs of a list of
//! SPARQL queries against an endpoint. The library loads such a document
//! ([`sparql::laborer::document`]), expands its multi-valued fields into one
//! concrete snapshot per run ([`sparql::laborer::expand`]), executes every run
//! ([`sparql::laborer::run`]), normalises the heterogeneous result encodings
//! into a single matrix shape ([`sparql::laborer::harmonize`]), and writes the
//! summaries and results through the adapters under [`sparql::laborer::io`].

pub mod sparql;

pub use sparql::laborer::{
    LaborerError, Result, document, error, expand, harmonize, io, model, run,
};
