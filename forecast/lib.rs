#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(unused_variables)]

//! # ghicast
//!
//! Turns sparse country-by-year indicator tables into dense yearly forecasts.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`normalize`] detects whether a table is wide (one column per year) or long
//!    (one row per country-year) and reshapes it into canonical `(country, year, value)` records.
//! 2. [`select`] keeps the rows whose year is one of the configured anchor years.
//! 3. [`estimate`] fits one shared penalized regression with a per-country quadratic trend,
//!    using the feature layout from [`construction`]. The result is a self-contained
//!    [`model::TrainedModel`] that carries the year center it was fitted with.
//! 4. [`predict`] evaluates the model on a country × year grid, clips the predictions and
//!    aggregates an unweighted global mean per year.
//!
//! [`pipeline`] wires the stages together; [`data`], [`output`] and [`query`] sit at the
//! file boundary.

pub mod config;
pub mod construction;
pub mod data;
pub mod estimate;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod predict;
pub mod query;
pub mod select;
