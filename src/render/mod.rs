//! Report rendering: self-contained HTML and a plain-text summary.

mod html;
mod text;

pub use html::render_html_report;
pub use text::render_text_report;
