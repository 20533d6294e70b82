pub mod analysis;
pub mod history;
pub mod song;
pub use analysis::*;
pub use history::*;
pub use song::*;
