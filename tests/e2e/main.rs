//! End-to-end scenarios driving the suite runner against in-memory doubles.

mod scenarios;
