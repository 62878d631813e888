//! Pipeline stages for turning table extractions into Markdown.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ titles ──▶ summaries ──▶ render
//! (filter)   (1 call)   (1 call/table) (Markdown)
//!              └──────┬──────┘
//!                   decode
//! ```
//!
//! 1. [`extract`] keeps `type == "table"` elements of the content list
//! 2. [`decode`] recovers JSON from model output; shared by the LLM stages
//! 3. [`titles`] names every table with one batched request
//! 4. [`summaries`] sends one request per table, marking failures per record
//! 5. [`render`] writes a fixed Markdown section per record

pub mod decode;
pub mod extract;
pub mod render;
pub mod summaries;
pub mod titles;
