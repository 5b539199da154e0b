//! Reusable chart components.

pub mod bubble_chart;
