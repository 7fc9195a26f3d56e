/*!
# SEO Ranking Dashboard

A password-protected web dashboard for tracking search-engine keyword
rankings over time, built in Rust.

## Overview

The dashboard loads a historical log of keyword positions (one snapshot per
date) from PostgreSQL or a CSV file, keeps it in a time-bounded in-memory
cache, and answers every user interaction by recomputing filters and
aggregates from that read-only table.

## Architecture

### Engine Layer
- **ranking**: Ranking observation rows and the loaded table
- **filter**: Cascading four-level category filter, date range and
  conflicts-only predicates, option-list derivation
- **metrics**: Position buckets, day-over-day new/lost keyword deltas,
  overview figures and chart series
- **conflicts**: Cannibalization detail formatting with row-local failure
  isolation

### Data Layer
- **loader**: PostgreSQL (sqlx) and CSV data sources
- **cache**: Time-bounded cache entry for the loaded table
- **downloader**: Raw table rows and export (CSV always, XLSX with `web`)

### Web Layer (feature `web`)
- **login**: Shared-password gate and per-session authentication state
- **graph**: PNG chart rendering with plotters
- **app**: Routing and middleware

## REST API Endpoints

- `/api/overview` - Project health figures and the daily average series
- `/api/detail` - Filtered statistics, options per level, and raw rows
- `/chart/{overview,detail,distribution}.png` - Rendered charts
- `/export/{csv,xlsx}` - Raw table download for the current filter
*/

pub mod cache;
pub mod conflicts;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod ranking;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod login;

/// Re-export the engine types to make them easier to use
pub use cache::*;
pub use conflicts::*;
pub use error::*;
pub use filter::*;
pub use metrics::*;
pub use ranking::*;
